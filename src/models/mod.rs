pub mod event;
pub mod order;
pub mod plan;

pub use event::Event;
pub use order::{
    OrderStatus, OrderTotals, PaymentStatus, ReservationState, TicketOrder, TicketOrderItem,
};
pub use plan::TicketPlan;
