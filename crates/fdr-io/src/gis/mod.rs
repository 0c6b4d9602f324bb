//! GIS export importer.
//!
//! Turns a directory of CSV tables exported from a utility GIS (CYME-style
//! network and equipment tables) into a flat MDL [`ObjectTree`](fdr_core::ObjectTree):
//! equipment becomes conductor, spacing and configuration records, sections
//! and their devices become links, customer loads become service
//! transformers with triplex meters. The tree is then made simulatable:
//! nominal voltages are propagated from the source, islands dropped and
//! phases normalized.

pub mod equipment;
mod importer;
mod phases;
pub mod tables;
mod voltage;

pub use importer::{import_database, import_gis, ImportResult};
pub use tables::GisDatabase;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use fdr_core::topology::{swing_buses, FeederGraph};
    use fdr_core::{FdrError, ObjectLibrary};
    use tempfile::tempdir;

    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body.trim_start()).unwrap();
    }

    fn two_sections(dir: &Path) {
        write(dir, "source.csv", "NodeId,NetworkId,DesiredVoltage\nA,FDR1,12.47\n");
        write(dir, "node.csv", "NodeId,X,Y\nA,0,0\nB,100,0\nC,100,50\n");
        write(
            dir,
            "section.csv",
            "SectionId,FromNodeId,ToNodeId,Phase\nS1,A,B,7\nS2,B,C,7\n",
        );
    }

    #[test]
    fn two_section_feeder() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        let result = import_gis(dir.path(), None).unwrap();
        let tree = &result.tree;

        let node_like = tree.count_kind("node") + tree.count_kind("meter");
        assert_eq!(node_like, 3);
        assert_eq!(tree.count_kind("overhead_line"), 2);
        assert_eq!(tree.count_kind("transformer_configuration"), 1);
        assert_eq!(swing_buses(tree), vec!["A".to_string()]);
        assert_eq!(result.swing, "A");

        let a = tree.by_name("A").unwrap();
        assert_eq!(a.get("phases"), Some("ABCN"));
        assert_eq!(a.get("nominal_voltage"), Some("7199.558"));
        assert_eq!(tree.by_name("C").unwrap().get("nominal_voltage"), Some("7199.558"));

        // 100 m between A and B
        let s1 = tree.by_name("S1").unwrap();
        assert_eq!(s1.get("length"), Some("328.084000"));
        assert_eq!(s1.get("phases"), Some("ABCN"));

        let graph = FeederGraph::from_tree(tree, ObjectLibrary::global());
        assert!(graph.islanded("A").is_empty());
        assert!(graph.parallel_links().is_empty());
        assert_eq!(result.stats.nodes, 3);
    }

    #[test]
    fn coordinates_are_scaled_into_canvas() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        let tree = import_gis(dir.path(), None).unwrap().tree;
        let c = tree.by_name("C").unwrap();
        assert_eq!(c.get("latitude"), Some("1200.000000"));
        assert_eq!(c.get("longitude"), Some("0.000000"));
        let a = tree.by_name("A").unwrap();
        assert_eq!(a.get("longitude"), Some("800.000000"));
    }

    #[test]
    fn source_count_must_be_one() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        write(dir.path(), "source.csv", "NodeId,NetworkId,DesiredVoltage\nA,F,12.47\nB,F,12.47\n");
        let err = import_gis(dir.path(), None).unwrap_err();
        let root = err.downcast_ref::<FdrError>().unwrap();
        assert!(matches!(root, FdrError::Validation(m) if m.contains("2 sources")));

        write(dir.path(), "source.csv", "NodeId,NetworkId,DesiredVoltage\n");
        assert!(import_gis(dir.path(), None).is_err());
    }

    #[test]
    fn missing_required_table_is_an_error() {
        let dir = tempdir().unwrap();
        write(dir.path(), "source.csv", "NodeId,NetworkId,DesiredVoltage\nA,F,12.47\n");
        let err = import_gis(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("section.csv"));
    }

    #[test]
    fn embedded_switch_is_split_out_of_its_line() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        write(
            dir.path(),
            "section_device.csv",
            "DeviceNumber,DeviceType,SectionId,Location\nOH1,3,S1,0\nSW1,13,S1,2\n",
        );
        write(
            dir.path(),
            "overhead_by_phase.csv",
            "DeviceNumber,PhaseConductorIdA,PhaseConductorIdB,PhaseConductorIdC,NeutralConductorId,ConductorSpacingId,Length\n\
             OH1,336ACSR,336ACSR,336ACSR,NONE,SP1,0\n",
        );
        write(dir.path(), "eq_conductor.csv", "EquipmentId,GMR,R50\n336ACSR,0.7437,0.1902\n");
        write(
            dir.path(),
            "eq_average_arrangement.csv",
            "EquipmentId,GMDPhaseToPhase,GMDPhaseToNeutral\nSP1,1.0,1.5\n",
        );
        write(dir.path(), "switch.csv", "DeviceNumber,EquipmentId,NormalStatus\nSW1,SWX,1\n");

        let result = import_gis(dir.path(), None).unwrap();
        let tree = &result.tree;
        let line = tree.by_name("OH1").unwrap();
        assert_eq!(line.get("from"), Some("A"));
        assert_eq!(line.get("to"), Some("nodeSW1"));
        assert_eq!(line.get("configuration"), Some("olc0"));
        assert_eq!(line.get("length"), Some("1.000000"));
        // no neutral conductor in the configuration
        assert_eq!(line.get("phases"), Some("ABC"));

        let sw = tree.by_name("SW1").unwrap();
        assert_eq!(sw.get("from"), Some("nodeSW1"));
        assert_eq!(sw.get("to"), Some("B"));
        assert_eq!(sw.get("status"), Some("CLOSED"));
        assert_eq!(sw.get("phases"), Some("ABC"));
        assert!(tree.by_name("nodeSW1").is_some());
        assert_eq!(result.stats.split_devices, 1);

        let spacing = tree.by_name("SP1").unwrap();
        assert_eq!(spacing.get("distance_AB"), Some("3.280840"));
    }

    #[test]
    fn missing_equipment_is_reported_by_id() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        write(
            dir.path(),
            "section_device.csv",
            "DeviceNumber,DeviceType,SectionId,Location\nX1,47,S2,0\n",
        );
        write(dir.path(), "transformer.csv", "DeviceNumber,EquipmentId\nX1,T50\n");
        let err = import_gis(dir.path(), None).unwrap_err();
        let root = err.downcast_ref::<FdrError>().unwrap();
        assert!(matches!(root, FdrError::MissingReference(id) if id.contains("T50")));
    }

    #[test]
    fn parallel_sections_are_split_through_a_midpoint() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        write(
            dir.path(),
            "section.csv",
            "SectionId,FromNodeId,ToNodeId,Phase\nS1,A,B,7\nS2,B,C,7\nS3,C,B,1\n",
        );
        let result = import_gis(dir.path(), None).unwrap();
        let tree = &result.tree;
        assert_eq!(result.stats.parallel_links, 1);
        let first = tree.by_name("S3par1").unwrap();
        assert_eq!(first.get("from"), Some("C"));
        assert_eq!(first.get("to"), Some("S3parNode"));
        let second = tree.by_name("S3par2").unwrap();
        assert_eq!(second.get("from"), Some("S3parNode"));
        assert_eq!(second.get("to"), Some("B"));
        assert_eq!(first.get("length"), second.get("length"));

        let graph = FeederGraph::from_tree(tree, ObjectLibrary::global());
        assert!(graph.parallel_links().is_empty());
    }

    #[test]
    fn islands_are_dropped() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        write(
            dir.path(),
            "section.csv",
            "SectionId,FromNodeId,ToNodeId,Phase\nS1,A,B,7\nS2,B,C,7\nS9,X,Y,7\n",
        );
        let result = import_gis(dir.path(), None).unwrap();
        assert_eq!(result.stats.islanded_nodes, 2);
        assert!(result.tree.by_name("X").is_none());
        assert!(result.tree.by_name("S9").is_none());
        assert!(result.diagnostics.has_issues());
    }

    #[test]
    fn residential_load_becomes_service_transformer_and_triplex_meter() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        write(
            dir.path(),
            "section_device.csv",
            "DeviceNumber,DeviceType,SectionId,Location\nLD1,20,S2,2\nLD2,20,S1,1\n",
        );
        write(
            dir.path(),
            "customer_load.csv",
            "DeviceNumber,ConsumerClassId,Phase,LoadValueType,LoadValue1,LoadValue2,ConnectedKVA\n\
             LD1,residential,1,0,12,3,0\n\
             LD1,residential,1,0,6,1,0\n\
             LD2,commercial,7,0,30,9,0\n",
        );
        let tree = import_gis(dir.path(), None).unwrap().tree;

        let spct = tree.by_name("SPCTLD1A").unwrap();
        assert_eq!(spct.get("from"), Some("C"));
        assert_eq!(spct.get("to"), Some("tpmLD1A"));
        assert_eq!(spct.get("phases"), Some("AS"));
        let cfg = tree.by_name("SPCTconfigLD1A").unwrap();
        assert_eq!(cfg.get("power_rating"), Some("25"));
        let tpn = tree.by_name("tpnLD1A").unwrap();
        assert_eq!(tpn.get("parent"), Some("tpmLD1A"));
        assert_eq!(tpn.get("power_12"), Some("18000.000+4000.000j"));
        assert_eq!(tpn.get("nominal_voltage"), Some("120.000"));

        let load = tree.by_name("LD2").unwrap();
        assert!(load.is_object("load"));
        assert_eq!(load.get("parent"), Some("A"));
        assert_eq!(load.get("constant_power_B"), Some("10000.000+3000.000j"));
        assert_eq!(load.get("load_class"), Some("C"));
    }

    #[test]
    fn node_names_colliding_with_devices_are_prefixed() {
        let dir = tempdir().unwrap();
        two_sections(dir.path());
        write(
            dir.path(),
            "section_device.csv",
            "DeviceNumber,DeviceType,SectionId,Location\nB,13,S1,0\n",
        );
        let tree = import_gis(dir.path(), None).unwrap().tree;
        assert!(tree.by_name("nB").unwrap().is_object("node"));
        assert_eq!(tree.by_name("B").unwrap().get("to"), Some("nB"));
        assert_eq!(tree.by_name("S2").unwrap().get("from"), Some("nB"));
    }
}
