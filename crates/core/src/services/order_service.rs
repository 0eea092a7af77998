use chrono::Utc;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::order::{Order, OrderRequest, OrderSide, OrderStatus, OrderType};
use crate::models::price::PriceQuote;

/// Keeps the simulated order blotter.
///
/// Orders are never sent anywhere. The only logic here is form validation and
/// deciding when a resting order's price condition is met.
#[derive(Debug, Default)]
pub struct OrderService {
    orders: Vec<Order>,
}

impl OrderService {
    pub fn new() -> Self {
        Self { orders: Vec::new() }
    }

    /// Validate an order form and record the order.
    ///
    /// Market orders start `Pending` (the caller fills or rejects them right
    /// away); everything else rests as `Open`. Invalid forms record nothing.
    pub fn submit(&mut self, request: OrderRequest) -> Result<Order, CoreError> {
        Self::validate(&request)?;

        let status = match request.order_type {
            OrderType::Market => OrderStatus::Pending,
            _ => OrderStatus::Open,
        };
        let order = Order {
            id: Uuid::new_v4(),
            symbol: request.symbol.trim().to_uppercase(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            status,
            created_at: Utc::now(),
            filled_price: None,
            filled_at: None,
        };
        log::debug!(
            "order {} submitted: {} {} {} {}",
            order.id, order.order_type, order.side, order.quantity, order.symbol
        );
        self.orders.push(order.clone());
        Ok(order)
    }

    /// Cancel a pending or open order.
    pub fn cancel(&mut self, id: Uuid) -> Result<Order, CoreError> {
        let order = self.get_mut(id)?;
        if !order.status.is_active() {
            return Err(CoreError::ValidationError(format!(
                "Order {id} is {} and can no longer be cancelled",
                order.status
            )));
        }
        order.status = OrderStatus::Cancelled;
        Ok(order.clone())
    }

    pub fn mark_filled(&mut self, id: Uuid, price: f64) -> Result<Order, CoreError> {
        let order = self.get_mut(id)?;
        if !order.status.is_active() {
            return Err(CoreError::ValidationError(format!(
                "Order {id} is {} and cannot be filled",
                order.status
            )));
        }
        order.status = OrderStatus::Filled;
        order.filled_price = Some(price);
        order.filled_at = Some(Utc::now());
        Ok(order.clone())
    }

    pub fn mark_rejected(&mut self, id: Uuid) -> Result<Order, CoreError> {
        let order = self.get_mut(id)?;
        if !order.status.is_active() {
            return Err(CoreError::ValidationError(format!(
                "Order {id} is {} and cannot be rejected",
                order.status
            )));
        }
        order.status = OrderStatus::Rejected;
        Ok(order.clone())
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    /// All orders, oldest first.
    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    #[must_use]
    pub fn open_orders(&self) -> Vec<&Order> {
        self.orders.iter().filter(|o| o.status.is_active()).collect()
    }

    /// Resting orders whose price condition holds at `quote`, with the price
    /// they would fill at.
    #[must_use]
    pub fn triggered(&self, quote: &PriceQuote) -> Vec<(Uuid, f64)> {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Open)
            .filter_map(|o| {
                let price = quote.get(&o.symbol)?;
                Self::is_triggered(o, price).then_some((o.id, price))
            })
            .collect()
    }

    fn is_triggered(order: &Order, price: f64) -> bool {
        let limit_ok = |limit: Option<f64>| match (order.side, limit) {
            (OrderSide::Buy, Some(l)) => price <= l,
            (OrderSide::Sell, Some(l)) => price >= l,
            (_, None) => false,
        };
        let stop_hit = |stop: Option<f64>| match (order.side, stop) {
            (OrderSide::Buy, Some(s)) => price >= s,
            (OrderSide::Sell, Some(s)) => price <= s,
            (_, None) => false,
        };
        match order.order_type {
            OrderType::Market => false,
            OrderType::Limit => limit_ok(order.limit_price),
            OrderType::StopLoss => stop_hit(order.stop_price),
            OrderType::StopLimit => stop_hit(order.stop_price) && limit_ok(order.limit_price),
        }
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut Order, CoreError> {
        self.orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| CoreError::OrderNotFound(id.to_string()))
    }

    /// Order form rules.
    fn validate(request: &OrderRequest) -> Result<(), CoreError> {
        if request.symbol.trim().is_empty() {
            return Err(CoreError::ValidationError("Symbol is required".into()));
        }
        if !(request.quantity.is_finite() && request.quantity > 0.0) {
            return Err(CoreError::ValidationError("Quantity must be greater than 0".into()));
        }

        let positive = |label: &str, value: Option<f64>| match value {
            Some(v) if v.is_finite() && v > 0.0 => Ok(()),
            Some(v) => Err(CoreError::ValidationError(format!("{label} must be greater than 0, got {v}"))),
            None => Err(CoreError::ValidationError(format!(
                "{label} is required for {} orders",
                request.order_type
            ))),
        };

        match request.order_type {
            OrderType::Market => Ok(()),
            OrderType::Limit => positive("Limit price", request.limit_price),
            OrderType::StopLoss => positive("Stop price", request.stop_price),
            OrderType::StopLimit => {
                positive("Stop price", request.stop_price)?;
                positive("Limit price", request.limit_price)
            }
        }
    }
}
