/// Lệnh UI gửi xuống chat worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Raw draft text; trimming and empty checks happen in the worker.
    SendMessage(String),
    /// Admin only: route the message stream to this counterpart.
    SelectConversation(String),
    ClearSelection,
    MarkRead {
        message_id: String,
    },
    MarkAllRead,
}
