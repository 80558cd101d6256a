pub mod deduplication;

pub use deduplication::plan_dedupe;
