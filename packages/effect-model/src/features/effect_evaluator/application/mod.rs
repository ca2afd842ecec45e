pub mod evaluator;

pub use evaluator::EffectEvaluator;
