//! Derived order statistics

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use shared::{Order, OrderStatus};

/// Counts per status plus today's delivered revenue.
///
/// Recomputed from whatever list is passed in; nothing is cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub processing: usize,
    pub packed: usize,
    pub shipped: usize,
    pub out_for_delivery: usize,
    pub delivered: usize,
    pub cancelled: usize,
    pub returned: usize,
    pub todays_revenue: f64,
}

impl OrderStats {
    pub fn compute<'a, Tz: TimeZone>(
        orders: impl IntoIterator<Item = &'a Order>,
        now: &DateTime<Tz>,
    ) -> Self {
        let mut stats = OrderStats::default();
        let today = now.date_naive();

        for order in orders {
            stats.total += 1;
            *stats.bucket_mut(order.status) += 1;
            if is_delivered_on(order, today, &now.timezone()) {
                stats.todays_revenue += order.total_amount;
            }
        }
        stats
    }

    pub fn count(&self, status: OrderStatus) -> usize {
        match status {
            OrderStatus::Pending => self.pending,
            OrderStatus::Confirmed => self.confirmed,
            OrderStatus::Processing => self.processing,
            OrderStatus::Packed => self.packed,
            OrderStatus::Shipped => self.shipped,
            OrderStatus::OutForDelivery => self.out_for_delivery,
            OrderStatus::Delivered => self.delivered,
            OrderStatus::Cancelled => self.cancelled,
            OrderStatus::Returned => self.returned,
        }
    }

    fn bucket_mut(&mut self, status: OrderStatus) -> &mut usize {
        match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Confirmed => &mut self.confirmed,
            OrderStatus::Processing => &mut self.processing,
            OrderStatus::Packed => &mut self.packed,
            OrderStatus::Shipped => &mut self.shipped,
            OrderStatus::OutForDelivery => &mut self.out_for_delivery,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
            OrderStatus::Returned => &mut self.returned,
        }
    }
}

/// Sum of `total_amount` over delivered orders placed on `now`'s calendar day.
pub fn todays_revenue<'a, Tz: TimeZone>(
    orders: impl IntoIterator<Item = &'a Order>,
    now: &DateTime<Tz>,
) -> f64 {
    let today = now.date_naive();
    let zone = now.timezone();
    orders
        .into_iter()
        .filter(|order| is_delivered_on(order, today, &zone))
        .map(|order| order.total_amount)
        .sum()
}

fn is_delivered_on<Tz: TimeZone>(order: &Order, day: chrono::NaiveDate, zone: &Tz) -> bool {
    order.status == OrderStatus::Delivered
        && order
            .order_date
            .is_some_and(|placed| placed.with_timezone(zone).date_naive() == day)
}
