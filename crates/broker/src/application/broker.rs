//! Order execution against the latest price snapshot
//!
//! [`ExecutionBroker`] is a plain state machine: it owns the order book and
//! the id counter and turns one [`TradeRequest`] into exactly one
//! [`TradeResponse`]. It never suspends, so whoever drives it (see
//! [`BrokerService`](super::BrokerService)) gets an atomic read-modify-write
//! per request.

use chrono::Utc;
use log::{debug, info, warn};
use pedlar_core::{
    Order, OrderId, PriceSnapshot, Side, TradeAction, TradeRequest, TradeResponse, round_to,
};
use thiserror::Error;

use super::book::OrderBook;

/// Decimal places kept in a reported profit
const PROFIT_DECIMALS: u32 = 2;

/// Why a request failed. Only logged; the wire carries a bare retcode.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("order {0} is not open")]
    UnknownOrder(OrderId),

    #[error("unsupported action {0}")]
    UnsupportedAction(u8),

    #[error("no {0} price quoted yet")]
    Unpriced(&'static str),

    #[error("order id space exhausted")]
    IdsExhausted,
}

pub struct ExecutionBroker {
    book: OrderBook,
    next_id: OrderId,
    leverage: f64,
}

impl ExecutionBroker {
    /// `first_id` must be non-zero; zero is what failed opens echo back
    pub fn new(first_id: OrderId, leverage: f64) -> Self {
        Self {
            book: OrderBook::new(),
            next_id: first_id.max(1),
            leverage,
        }
    }

    /// Process one request. Always produces a response.
    pub fn handle(&mut self, request: &TradeRequest, snapshot: &PriceSnapshot) -> TradeResponse {
        match self.execute(request, snapshot) {
            Ok(response) => response,
            Err(rejection) => {
                warn!(
                    "Rejected {} for order {}: {}",
                    request.action.as_str(),
                    request.order_id,
                    rejection
                );
                TradeResponse::failure(request.order_id)
            }
        }
    }

    pub fn execute(
        &mut self,
        request: &TradeRequest,
        snapshot: &PriceSnapshot,
    ) -> Result<TradeResponse, Rejection> {
        match request.action {
            TradeAction::Buy => self.open(Side::Long, request.volume, snapshot),
            TradeAction::Sell => self.open(Side::Short, request.volume, snapshot),
            TradeAction::Close => self.close(request.order_id, snapshot),
            other => Err(Rejection::UnsupportedAction(other.into())),
        }
    }

    fn open(
        &mut self,
        side: Side,
        volume: f64,
        snapshot: &PriceSnapshot,
    ) -> Result<TradeResponse, Rejection> {
        let price = Order::open_price_for(side, snapshot);
        if price == 0.0 {
            return Err(Rejection::Unpriced(quote_name(side)));
        }

        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(Rejection::IdsExhausted)?;

        let order = Order::new(id, side, price, volume, Utc::now());
        if !self.book.insert(order) {
            // Unreachable while ids only come from the counter
            return Err(Rejection::IdsExhausted);
        }

        info!(
            "Opened {} order {} at {} volume {}",
            side, id, price, volume
        );
        Ok(TradeResponse::success(id, price, 0.0))
    }

    fn close(&mut self, id: OrderId, snapshot: &PriceSnapshot) -> Result<TradeResponse, Rejection> {
        let order = self.book.get(id).ok_or(Rejection::UnknownOrder(id))?;

        let price = order.close_price(snapshot);
        if price == 0.0 {
            return Err(Rejection::Unpriced(quote_name(order.side.opposite())));
        }
        let profit = round_to(order.profit_at(price, self.leverage), PROFIT_DECIMALS);

        if let Some(order) = self.book.remove(id) {
            info!(
                "Closed {} order {} at {} profit {} (opened at {})",
                order.side, id, price, profit, order.open_price
            );
        }
        Ok(TradeResponse::success(id, price, profit))
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Id the next successful open will receive
    pub fn next_id(&self) -> OrderId {
        self.next_id
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    /// Open orders, oldest first
    pub fn open_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.book.iter().cloned().collect();
        orders.sort_by_key(|o| o.id);
        orders
    }

    /// Consume the broker, yielding whatever is still open
    pub fn into_orphans(self) -> Vec<Order> {
        debug!("Broker stopped with next id {}", self.next_id);
        self.book.into_orders()
    }
}

/// Quote a given side trades against
fn quote_name(side: Side) -> &'static str {
    match side {
        Side::Long => "ask",
        Side::Short => "bid",
    }
}

/// Log every order still open at shutdown
pub fn report_orphans(orders: &[Order]) {
    if orders.is_empty() {
        info!("No open orders at shutdown");
        return;
    }

    let now = Utc::now();
    warn!("{} order(s) still open at shutdown", orders.len());
    for order in orders {
        let age = now.signed_duration_since(order.opened_at);
        warn!(
            "Orphaned order {}: {} {} at {} opened {}s ago",
            order.id,
            order.side,
            order.volume,
            order.open_price,
            age.num_seconds()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedlar_core::RETCODE_FAILED;

    fn priced(bid: f64, ask: f64) -> PriceSnapshot {
        PriceSnapshot::new(bid, ask)
    }

    fn broker() -> ExecutionBroker {
        ExecutionBroker::new(1, 100.0)
    }

    #[test]
    fn test_ids_unique_and_increasing() {
        let mut broker = broker();
        let snapshot = priced(1.1, 1.1002);

        let mut last = 0;
        for i in 0..20 {
            let req = if i % 2 == 0 {
                TradeRequest::buy(0.1)
            } else {
                TradeRequest::sell(0.1)
            };
            let resp = broker.handle(&req, &snapshot);
            assert!(resp.is_ok());
            assert!(resp.order_id > last);
            last = resp.order_id;
        }
        assert_eq!(broker.book().len(), 20);
    }

    #[test]
    fn test_ids_not_reused_after_close() {
        let mut broker = broker();
        let snapshot = priced(1.1, 1.1);

        let first = broker.handle(&TradeRequest::buy(0.1), &snapshot);
        broker.handle(&TradeRequest::close(first.order_id), &snapshot);
        let second = broker.handle(&TradeRequest::buy(0.1), &snapshot);

        assert_eq!(second.order_id, first.order_id + 1);
    }

    #[test]
    fn test_open_prices() {
        let mut broker = broker();
        let snapshot = priced(1.1000, 1.1002);

        let buy = broker.handle(&TradeRequest::buy(0.1), &snapshot);
        assert_eq!(buy.price, 1.1002);
        assert_eq!(buy.profit, 0.0);

        let sell = broker.handle(&TradeRequest::sell(0.1), &snapshot);
        assert_eq!(sell.price, 1.1000);
    }

    #[test]
    fn test_long_close_profit() {
        let mut broker = broker();
        let open = broker.handle(&TradeRequest::buy(0.01), &priced(1.1998, 1.2000));
        assert_eq!(open.price, 1.2000);

        let close = broker.handle(&TradeRequest::close(open.order_id), &priced(1.1950, 1.1952));
        assert!(close.is_ok());
        assert_eq!(close.price, 1.1950);
        assert_eq!(close.profit, -4.18);
    }

    #[test]
    fn test_short_close_profit() {
        let mut broker = broker();
        let open = broker.handle(&TradeRequest::sell(0.01), &priced(1.2000, 1.2002));
        assert_eq!(open.price, 1.2000);

        let close = broker.handle(&TradeRequest::close(open.order_id), &priced(1.1948, 1.1950));
        assert_eq!(close.price, 1.1950);
        assert_eq!(close.profit, 4.18);
    }

    #[test]
    fn test_immediate_close_without_spread_is_flat() {
        let mut broker = broker();
        let snapshot = priced(1.25, 1.25);

        let open = broker.handle(&TradeRequest::buy(0.5), &snapshot);
        let close = broker.handle(&TradeRequest::close(open.order_id), &snapshot);
        assert_eq!(close.profit, 0.0);
    }

    #[test]
    fn test_immediate_close_loses_the_spread() {
        let mut broker = broker();
        let snapshot = priced(1.0000, 1.0010);

        let open = broker.handle(&TradeRequest::buy(0.01), &snapshot);
        let close = broker.handle(&TradeRequest::close(open.order_id), &snapshot);

        // (1.0000 - 1.0010) * 100 * 0.01 * 1000 / 1.0000
        assert_eq!(close.profit, -1.0);

        let open = broker.handle(&TradeRequest::sell(0.01), &snapshot);
        let close = broker.handle(&TradeRequest::close(open.order_id), &snapshot);
        assert!(close.profit < 0.0);
    }

    #[test]
    fn test_unknown_order_leaves_book_unchanged() {
        let mut broker = broker();
        let snapshot = priced(1.1, 1.1002);
        broker.handle(&TradeRequest::buy(0.1), &snapshot);

        let resp = broker.handle(&TradeRequest::close(999), &snapshot);
        assert_eq!(resp, TradeResponse::failure(999));
        assert_eq!(resp.retcode, RETCODE_FAILED);
        assert_eq!(broker.book().len(), 1);
    }

    #[test]
    fn test_double_close_fails_second_time() {
        let mut broker = broker();
        let snapshot = priced(1.1, 1.1002);
        let open = broker.handle(&TradeRequest::buy(0.1), &snapshot);

        assert!(broker.handle(&TradeRequest::close(open.order_id), &snapshot).is_ok());
        let again = broker.handle(&TradeRequest::close(open.order_id), &snapshot);
        assert_eq!(again.retcode, RETCODE_FAILED);
        assert_eq!(again.order_id, open.order_id);
    }

    #[test]
    fn test_unpriced_open_fails() {
        let mut broker = broker();
        let resp = broker.handle(&TradeRequest::buy(0.1), &PriceSnapshot::default());
        assert_eq!(resp, TradeResponse::failure(0));
        assert!(broker.book().is_empty());
        assert_eq!(broker.next_id(), 1);

        let err = broker
            .execute(&TradeRequest::sell(0.1), &priced(0.0, 1.1))
            .unwrap_err();
        assert_eq!(err, Rejection::Unpriced("bid"));
    }

    #[test]
    fn test_unpriced_close_keeps_order() {
        let mut broker = broker();
        let open = broker.handle(&TradeRequest::buy(0.1), &priced(1.1, 1.1002));

        let resp = broker.handle(&TradeRequest::close(open.order_id), &priced(0.0, 1.1002));
        assert!(!resp.is_ok());
        assert!(broker.book().contains(open.order_id));
    }

    #[test]
    fn test_noop_and_unknown_actions_fail() {
        let mut broker = broker();
        let snapshot = priced(1.1, 1.1002);

        let noop = TradeRequest::new(3, 0.1, TradeAction::Noop);
        assert_eq!(broker.handle(&noop, &snapshot), TradeResponse::failure(3));

        let bogus = TradeRequest::new(4, 0.1, TradeAction::Unknown(42));
        assert_eq!(
            broker.execute(&bogus, &snapshot).unwrap_err(),
            Rejection::UnsupportedAction(42)
        );
        assert!(broker.book().is_empty());
    }

    #[test]
    fn test_into_orphans() {
        let mut broker = ExecutionBroker::new(10, 100.0);
        let snapshot = priced(1.1, 1.1002);
        broker.handle(&TradeRequest::buy(0.1), &snapshot);
        broker.handle(&TradeRequest::sell(0.2), &snapshot);
        broker.handle(&TradeRequest::close(10), &snapshot);

        assert_eq!(broker.open_orders().len(), 1);
        let orphans = broker.into_orphans();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, 11);
        assert_eq!(orphans[0].side, Side::Short);
        report_orphans(&orphans);
    }

    #[test]
    fn test_zero_first_id_is_bumped() {
        let broker = ExecutionBroker::new(0, 100.0);
        assert_eq!(broker.next_id(), 1);
    }
}
