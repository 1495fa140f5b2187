use std::sync::Arc;

use cadis_core::{Config, Simulator};
use cadis_kernel::Kernel;

#[derive(Clone)]
pub(crate) struct AppState {
    kernel: Kernel,
    config: Arc<Config>,
    simulator: Arc<Simulator>,
}

impl AppState {
    pub fn new(kernel: Kernel, config: Config) -> Self {
        let simulator = Simulator::new(config.simulator);
        Self {
            kernel,
            config: Arc::new(config),
            simulator: Arc::new(simulator),
        }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }
}
