mod card;
mod deck;
mod filter;
mod grade;
mod ids;
mod session;
mod summary;

pub use ids::CardId;

pub use card::Card;
pub use deck::{Deck, DeckError, DeckSessionSettings};
pub use filter::FilterSettings;
pub use grade::Grade;
pub use session::{CardResult, GradeError, SessionState};
pub use summary::SessionSummary;
