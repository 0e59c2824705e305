pub mod lead;
pub mod promotion;
pub mod quote;
pub mod staff;
