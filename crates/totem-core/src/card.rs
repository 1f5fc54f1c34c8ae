use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Number of distinct colours a card can have.
pub const COLOR_COUNT: u8 = 4;
/// Number of distinct shapes a card can have.
pub const SHAPE_COUNT: u8 = 18;
/// Total cards in a Totem deck (`COLOR_COUNT * SHAPE_COUNT`).
pub const DECK_SIZE: usize = COLOR_COUNT as usize * SHAPE_COUNT as usize;

/// A single Totem playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub color: u8,
    pub shape: u8,
}

impl Card {
    pub fn new(color: u8, shape: u8) -> Self {
        Self { color, shape }
    }

    /// Two cards "match" for fight purposes when their shapes agree.
    pub fn matches_shape(&self, other: &Card) -> bool {
        self.shape == other.shape
    }
}

/// Builds the full 72-card deck in a fixed, deterministic order.
pub fn full_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for color in 0..COLOR_COUNT {
        for shape in 0..SHAPE_COUNT {
            deck.push(Card::new(color, shape));
        }
    }
    deck
}

/// Builds a freshly shuffled 72-card deck, seeded from the OS CSPRNG.
pub fn shuffled_deck() -> Vec<Card> {
    let mut deck = full_deck();
    let mut rng = StdRng::from_os_rng();
    deck.shuffle(&mut rng);
    deck
}
