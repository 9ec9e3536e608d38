pub mod candidate;
pub mod classification;
pub mod persisted;
pub mod run;
