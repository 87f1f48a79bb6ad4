pub mod confusion;

pub use confusion::{class_of, ConfusionMatrix};
