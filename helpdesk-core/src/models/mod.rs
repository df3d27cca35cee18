//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod comment;
pub mod pagination;
pub mod role;
pub mod ticket;
pub mod user;
pub mod validation;

pub use comment::CommentContent;
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use role::Role;
pub use ticket::{Priority, TicketDescription, TicketStatus, TicketTitle};
pub use user::{Department, Email, Password, PhoneNumber, Username};
pub use validation::ValidationError;
