pub mod error;
pub mod memory;
pub mod state;
pub mod store;
pub mod supabase;
pub mod supabase_store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use state::AppState;
pub use store::{ClinicStore, CompletionTx};
pub use supabase_store::SupabaseStore;
