pub mod composer;
pub mod conversations;
pub mod router;
pub mod session;
pub mod stream;
pub mod unread;
pub mod worker;

pub use composer::{Composer, send_message};
pub use conversations::subscribe_counterparts;
pub use router::ConversationRouter;
pub use session::{IdentityResolver, Session, SessionProvider};
pub use stream::{Conversation, subscribe_conversation};
pub use unread::{mark_all_read, mark_read, subscribe_unread};
pub use worker::ChatWorker;
