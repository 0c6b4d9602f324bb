//! Ctrl-C handling for long simulator rounds.

use fdr_batch::CancelToken;
use once_cell::sync::Lazy;

/// Fired by SIGINT; shared with every harness the binary builds.
pub static CANCEL: Lazy<CancelToken> = Lazy::new(CancelToken::new);

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: libc::c_int) {
    CANCEL.cancel();
}

/// Install the SIGINT handler and return the token it fires.
///
/// The token is created before the handler goes in, so the handler only
/// ever stores into an existing flag.
pub fn install_interrupt_handler() -> CancelToken {
    let token = Lazy::force(&CANCEL).clone();
    #[cfg(unix)]
    {
        let handler = on_interrupt as extern "C" fn(libc::c_int);
        // SAFETY: the handler only performs an atomic store.
        let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            tracing::warn!("could not install the Ctrl-C handler; runs cannot be interrupted cleanly");
        }
    }
    token
}
