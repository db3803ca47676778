//! # Responses
//!
//! Extension point for acting on what a handler produced, such as building
//! and sending a reply message. Implementations are constructed per update
//! and run once.

use crate::types::HandlerResult;

pub trait Response: Send {
    fn run(&mut self) -> HandlerResult<()>;
}

impl<R: Response + ?Sized> Response for Box<R> {
    fn run(&mut self) -> HandlerResult<()> {
        (**self).run()
    }
}
