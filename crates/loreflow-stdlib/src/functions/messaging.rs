//! Session message delivery

use loreflow_core::{EngineError, FlowValue, Messenger, ServiceContext, ServiceFunction};

/// `send_message(target, text)`: deliver rendered text to an entity's
/// sessions through the host's messenger
pub struct SendMessage;

impl ServiceFunction for SendMessage {
    fn call(&self, ctx: &mut ServiceContext<'_>) -> Result<FlowValue, EngineError> {
        let target = ctx.entity_param("target")?;
        let text = ctx.string_param("text")?;
        ctx.messenger.deliver(&target, &text)?;
        Ok(FlowValue::null())
    }
}
