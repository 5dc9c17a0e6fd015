pub mod conversation_gate;
pub mod message_repository;
pub mod message_store;
pub mod pg_message_repository;
pub mod relationship_store;

pub use conversation_gate::ConversationGate;
pub use message_repository::{InMemoryMessageRepository, MessageRepository};
pub use message_store::MessageStore;
pub use pg_message_repository::PgMessageRepository;
pub use relationship_store::{InMemoryRelationshipStore, PgRelationshipStore, RelationshipStore};
