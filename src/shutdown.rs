use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stop flag shared between the Ctrl-C handler and the scheduler loop.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Shutdown::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the flag on Ctrl-C. The current run is always allowed to finish.
    pub fn install_ctrlc_handler(&self) {
        let flag = self.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Received shutdown signal, finishing current run");
            flag.request();
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }
    }
}
