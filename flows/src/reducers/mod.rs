//! Flow reducers.
//!
//! Pure transition functions: `(State, Event, Environment) → (State,
//! Effects)`. The sign-in and sign-up router machines spawn verification
//! sub-machines as independent actors and receive their reports as
//! forwarded events.

pub mod sign_in;
pub mod sign_up;
pub mod verification;

pub use sign_in::SignInReducer;
pub use sign_up::SignUpReducer;
pub use verification::VerificationReducer;
