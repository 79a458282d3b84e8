pub mod pd;
pub mod ratios;
pub mod scenario;
pub mod survival;
