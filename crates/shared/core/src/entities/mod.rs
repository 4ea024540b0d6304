mod order;
mod side;

pub use order::{Order, OrderId, profit};
pub use side::Side;
