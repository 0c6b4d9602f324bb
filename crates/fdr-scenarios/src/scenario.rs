use anyhow::{anyhow, Context, Result};
use chrono::{Days, NaiveDate, NaiveDateTime};
use fdr_core::Season;
use fdr_populate::TechnologyCase;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Simulated span around one reference day.
///
/// The simulator starts a day early so thermal state settles before the
/// recorded day begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockWindow {
    pub start: NaiveDateTime,
    pub record_start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl ClockWindow {
    pub fn start_str(&self) -> String {
        self.start.format(TIME_FORMAT).to_string()
    }

    pub fn stop_str(&self) -> String {
        self.stop.format(TIME_FORMAT).to_string()
    }

    pub fn record_start_str(&self) -> String {
        self.record_start.format(TIME_FORMAT).to_string()
    }

    /// Whether `time` falls on the recorded day. The stop instant belongs
    /// to the next day.
    pub fn records(&self, time: NaiveDateTime) -> bool {
        time >= self.record_start && time < self.stop
    }
}

/// The three reference days of one feeder calibration. Never mutated once
/// a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub feeder: String,
    pub region: u8,
    pub case: TechnologyCase,
    pub summer: NaiveDate,
    pub winter: NaiveDate,
    pub spring: NaiveDate,
}

impl Scenario {
    pub fn new(feeder: impl Into<String>, region: u8, case: TechnologyCase, days: [NaiveDate; 3]) -> Result<Self> {
        if !(1..=6).contains(&region) {
            return Err(fdr_core::FdrError::Config(format!("region {region} is outside 1..=6")).into());
        }
        let [summer, winter, spring] = days;
        Ok(Self { feeder: feeder.into(), region, case, summer, winter, spring })
    }

    /// Parse `summer,winter,spring` dates in `YYYY-MM-DD` form.
    pub fn parse_days(text: &str) -> Result<[NaiveDate; 3]> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        let [summer, winter, spring] = parts.as_slice() else {
            return Err(anyhow!("expected three comma-separated dates, got '{text}'"));
        };
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("parsing date '{s}'"))
        };
        Ok([parse(summer)?, parse(winter)?, parse(spring)?])
    }

    pub fn day(&self, season: Season) -> NaiveDate {
        match season {
            Season::Summer => self.summer,
            Season::Winter => self.winter,
            Season::Spring => self.spring,
        }
    }

    pub fn days(&self) -> [(Season, NaiveDate); 3] {
        Season::ALL.map(|s| (s, self.day(s)))
    }

    /// Season whose reference day appears in `file_name`.
    pub fn season_of(&self, file_name: &str) -> Option<Season> {
        self.days()
            .into_iter()
            .find(|(_, day)| file_name.contains(&day.format(DATE_FORMAT).to_string()))
            .map(|(season, _)| season)
    }
}

/// Clock window for `day`: start a day before, stop a day after.
pub fn clock_window(day: NaiveDate) -> ClockWindow {
    let record_start = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    ClockWindow {
        start: record_start - Days::new(1),
        record_start,
        stop: record_start + Days::new(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_brackets_the_day() {
        let window = clock_window(NaiveDate::from_ymd_opt(2013, 3, 1).unwrap());
        assert_eq!(window.start_str(), "2013-02-28 00:00:00");
        assert_eq!(window.record_start_str(), "2013-03-01 00:00:00");
        assert_eq!(window.stop_str(), "2013-03-02 00:00:00");
        assert!(window.records(window.record_start));
        assert!(!window.records(window.start));
        assert!(!window.records(window.stop));
    }

    #[test]
    fn parses_days_and_matches_seasons() {
        let days = Scenario::parse_days("2013-07-31, 2013-01-15,2013-04-10").unwrap();
        let scenario = Scenario::new("F1", 4, TechnologyCase::Base, days).unwrap();
        assert_eq!(scenario.season_of("Calib_ID1_Config_ID0_2013-01-15.glm"), Some(Season::Winter));
        assert_eq!(scenario.season_of("other.glm"), None);
        assert!(Scenario::parse_days("2013-07-31").is_err());
        assert!(Scenario::new("F1", 9, TechnologyCase::Base, days).is_err());
    }
}
