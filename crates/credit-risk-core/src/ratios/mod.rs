pub mod codes;
pub mod extractor;

pub use codes::{NamedRatio, RatioCode, RatioVector, RATIO_COUNT};
pub use extractor::{
    compute_ratios, extract_ratios, resolve, Averaged, BaseQuantities, PriorPeriodStrategy,
    RatioExtraction,
};
