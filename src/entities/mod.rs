// Entity Models
// Members, their fee transactions, and club events.
//
// Members are never physically deleted (only deactivated); transactions and
// events are immutable once recorded.

pub mod country;
pub mod member;
pub mod transaction;
pub mod event;

pub use country::{Country, GrowthMode, PerCountry};
pub use member::{validate_email, Member, MembershipType, NewMember};
pub use transaction::{NewTransaction, Transaction, TransactionType};
pub use event::{ClubEvent, NewEvent};
