//! Order list filtering
//!
//! Pure functions over the in-memory list. Every active criterion must match
//! (AND). Dates compare in the time zone of the `now` passed in, so "today"
//! means the caller's calendar day.

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use shared::{Order, OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    Yesterday,
    /// Within the last 7 days
    Week,
    /// Within the last 30 days
    Month,
    /// Inclusive calendar days; an open side is unbounded
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl DateFilter {
    pub fn matches<Tz: TimeZone>(&self, order: &Order, now: &DateTime<Tz>) -> bool {
        if *self == DateFilter::All {
            return true;
        }
        let Some(placed) = order.order_date else {
            return false;
        };
        let placed = placed.with_timezone(&now.timezone());
        let today = now.date_naive();

        match *self {
            DateFilter::All => true,
            DateFilter::Today => placed.date_naive() == today,
            DateFilter::Yesterday => today
                .pred_opt()
                .is_some_and(|yesterday| placed.date_naive() == yesterday),
            DateFilter::Week => placed >= now.clone() - Duration::days(7),
            DateFilter::Month => placed >= now.clone() - Duration::days(30),
            DateFilter::Custom { start, end } => {
                let day = placed.date_naive();
                start.is_none_or(|start| day >= start) && end.is_none_or(|end| day <= end)
            }
        }
    }
}

/// Search text plus status, payment and date criteria.
///
/// `None` for status or payment means "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub search: String,
    pub status: Option<OrderStatus>,
    pub payment: Option<PaymentStatus>,
    pub date: DateFilter,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payment(mut self, payment: PaymentStatus) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn with_date(mut self, date: DateFilter) -> Self {
        self.date = date;
        self
    }

    pub fn matches<Tz: TimeZone>(&self, order: &Order, now: &DateTime<Tz>) -> bool {
        self.matches_search(order)
            && self.status.is_none_or(|status| order.status == status)
            && self.payment.is_none_or(|payment| order.payment_status == payment)
            && self.date.matches(order, now)
    }

    /// Matching orders, in list order.
    pub fn apply<'a, Tz: TimeZone>(&self, orders: &'a [Order], now: &DateTime<Tz>) -> Vec<&'a Order> {
        orders.iter().filter(|order| self.matches(order, now)).collect()
    }

    fn matches_search(&self, order: &Order) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            order.id.as_str(),
            order.order_number.as_str(),
            order.customer.name.as_str(),
            order.customer.phone.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}
