//! Pure position ledger: the deterministic state transitions behind every
//! accepted trading action and every per-tick mark-to-market pass.

use crate::domain::{ActionType, ParticipantSide, PositionSide, UserId};

/// Per-participant runtime state, owned exclusively by its session.
///
/// Invariant: entry_price and quantity are both zero whenever position is
/// FLAT; realized_pnl only moves on a closing or flipping trade.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    /// Persisted participant row id, used for snapshot writes.
    pub participant_id: String,
    pub user_id: UserId,
    pub side: ParticipantSide,
    pub position: PositionSide,
    pub entry_price: f64,
    pub quantity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub starting_balance: f64,
}

impl PlayerState {
    pub fn new(
        participant_id: String,
        user_id: UserId,
        side: ParticipantSide,
        starting_balance: f64,
    ) -> Self {
        PlayerState {
            participant_id,
            user_id,
            side,
            position: PositionSide::Flat,
            entry_price: 0.0,
            quantity: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            starting_balance,
        }
    }

    /// Recompute unrealized PnL from the latest authoritative price.
    pub fn mark_to_market(&mut self, price: f64) {
        self.unrealized_pnl = self.unrealized_at(price);
    }

    /// Unrealized PnL at a given price without mutating state.
    pub fn unrealized_at(&self, price: f64) -> f64 {
        match self.position {
            PositionSide::Long => (price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - price) * self.quantity,
            PositionSide::Flat => 0.0,
        }
    }

    /// Realized + unrealized.
    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl
    }

    /// Total PnL as a percent of the locked starting balance; zero when the
    /// balance is non-positive to avoid division faults.
    pub fn pnl_percent(&self) -> f64 {
        if self.starting_balance > 0.0 {
            self.total_pnl() / self.starting_balance * 100.0
        } else {
            0.0
        }
    }

    fn flatten(&mut self) {
        self.position = PositionSide::Flat;
        self.entry_price = 0.0;
        self.quantity = 0.0;
        self.unrealized_pnl = 0.0;
    }

    fn realize_and_flatten(&mut self, price: f64) {
        self.realized_pnl += self.unrealized_at(price);
        self.flatten();
    }

    fn add_to_position(&mut self, quantity: f64, price: f64) {
        let total_cost = self.entry_price * self.quantity + price * quantity;
        let total_quantity = self.quantity + quantity;
        self.entry_price = total_cost / total_quantity;
        self.quantity = total_quantity;
    }

    /// Apply an accepted action at the server-determined execution price.
    ///
    /// BUY opens/adds a long or closes a short; SELL opens/adds a short or
    /// closes a long; CLOSE flattens whatever is held (a no-op when flat).
    pub fn apply_action(&mut self, action: ActionType, quantity: f64, price: f64) {
        match action {
            ActionType::Close => {
                if self.position != PositionSide::Flat {
                    self.realize_and_flatten(price);
                }
            }
            ActionType::Buy => match self.position {
                PositionSide::Short => self.realize_and_flatten(price),
                PositionSide::Flat => {
                    self.position = PositionSide::Long;
                    self.entry_price = price;
                    self.quantity = quantity;
                }
                PositionSide::Long => self.add_to_position(quantity, price),
            },
            ActionType::Sell => match self.position {
                PositionSide::Long => self.realize_and_flatten(price),
                PositionSide::Flat => {
                    self.position = PositionSide::Short;
                    self.entry_price = price;
                    self.quantity = quantity;
                }
                PositionSide::Short => self.add_to_position(quantity, price),
            },
        }
    }

    /// Signed position size for persistence: positive long, negative short.
    pub fn signed_size(&self) -> f64 {
        match self.position {
            PositionSide::Long => self.quantity,
            PositionSide::Short => -self.quantity,
            PositionSide::Flat => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> PlayerState {
        PlayerState::new(
            "p1".to_string(),
            UserId::new("alice".to_string()),
            ParticipantSide::A,
            10_000.0,
        )
    }

    #[test]
    fn test_long_close_realizes_gain() {
        let mut p = player();
        p.apply_action(ActionType::Buy, 10.0, 100.0);
        p.apply_action(ActionType::Close, 0.0, 150.0);

        assert_eq!(p.realized_pnl, 500.0);
        assert_eq!(p.position, PositionSide::Flat);
        assert_eq!(p.entry_price, 0.0);
        assert_eq!(p.quantity, 0.0);
        assert_eq!(p.unrealized_pnl, 0.0);
    }

    #[test]
    fn test_short_close_realizes_gain() {
        let mut p = player();
        p.apply_action(ActionType::Sell, 10.0, 100.0);
        p.apply_action(ActionType::Close, 0.0, 80.0);

        assert_eq!(p.realized_pnl, 200.0);
        assert_eq!(p.position, PositionSide::Flat);
    }

    #[test]
    fn test_averaging_buy() {
        let mut p = player();
        p.apply_action(ActionType::Buy, 10.0, 100.0);
        p.apply_action(ActionType::Buy, 10.0, 120.0);

        assert_eq!(p.position, PositionSide::Long);
        assert_eq!(p.entry_price, 110.0);
        assert_eq!(p.quantity, 20.0);
        assert_eq!(p.realized_pnl, 0.0);
    }

    #[test]
    fn test_sell_closes_long() {
        let mut p = player();
        p.apply_action(ActionType::Buy, 5.0, 100.0);
        p.apply_action(ActionType::Sell, 5.0, 110.0);

        assert_eq!(p.realized_pnl, 50.0);
        assert_eq!(p.position, PositionSide::Flat);
    }

    #[test]
    fn test_buy_closes_short() {
        let mut p = player();
        p.apply_action(ActionType::Sell, 4.0, 100.0);
        p.apply_action(ActionType::Buy, 4.0, 90.0);

        assert_eq!(p.realized_pnl, 40.0);
        assert_eq!(p.position, PositionSide::Flat);
    }

    #[test]
    fn test_close_while_flat_is_noop() {
        let mut p = player();
        p.apply_action(ActionType::Close, 0.0, 100.0);
        assert_eq!(p, player());
    }

    #[test]
    fn test_mark_to_market() {
        let mut p = player();
        p.apply_action(ActionType::Buy, 1.0, 100.0);
        p.mark_to_market(110.0);
        assert_eq!(p.unrealized_pnl, 10.0);
        assert_eq!(p.total_pnl(), 10.0);
        // 10 / 10_000 * 100
        assert!((p.pnl_percent() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_short_mark_to_market_loss() {
        let mut p = player();
        p.apply_action(ActionType::Sell, 2.0, 100.0);
        p.mark_to_market(105.0);
        assert_eq!(p.unrealized_pnl, -10.0);
        assert_eq!(p.signed_size(), -2.0);
    }

    #[test]
    fn test_zero_starting_balance_pnl_percent() {
        let mut p = player();
        p.starting_balance = 0.0;
        p.apply_action(ActionType::Buy, 1.0, 100.0);
        p.mark_to_market(200.0);
        assert_eq!(p.pnl_percent(), 0.0);
    }
}
