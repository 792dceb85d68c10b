use market_structure::{Bar, OrderBlock, StructureAlgorithm, StructureConfig};

/// The work a compute worker performs on one buffer
pub trait Calculation: Send + Sync + 'static {
    fn run(&self, key: &str, bars: &[Bar]) -> Vec<OrderBlock>;
}

/// Full structure replay over the buffer
#[derive(Debug, Clone, Default)]
pub struct StructureCalculation {
    config: StructureConfig,
}

impl StructureCalculation {
    pub fn new(config: StructureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StructureConfig {
        &self.config
    }
}

impl Calculation for StructureCalculation {
    fn run(&self, _key: &str, bars: &[Bar]) -> Vec<OrderBlock> {
        StructureAlgorithm::replay(self.config.clone(), bars)
    }
}

impl<F> Calculation for F
where
    F: Fn(&str, &[Bar]) -> Vec<OrderBlock> + Send + Sync + 'static,
{
    fn run(&self, key: &str, bars: &[Bar]) -> Vec<OrderBlock> {
        self(key, bars)
    }
}
