//! Order state controller
//!
//! Holds the vendor's order list, merges REST fetches and push events into
//! it, and runs the status and delivery-assignment commands.
//!
//! State lives behind a `std::sync::RwLock` that is never held across an
//! `.await`. Every backend call races the controller's cancellation token,
//! and no state is written once [`OrderStateController::shutdown`] ran.

use chrono::{DateTime, Local, TimeZone};
use portal_client::notification::{ListenerHandle, NotificationClient, channel};
use portal_client::{ClientResult, PortalApi};
use shared::{DeliveryModel, DeliveryRoster, Order, OrderStatus, VendorProfile};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::assignment::{AssignmentDraft, validate_assignment};
use super::error::{OrderError, OrderResult};
use super::filter::OrderFilter;
use super::stats::OrderStats;
use crate::notice::{Notice, NoticeBoard};

/// What the UI renders from
#[derive(Debug, Clone, Default)]
pub struct OrdersState {
    pub orders: Vec<Order>,
    /// First load in flight
    pub loading: bool,
    /// User refresh in flight
    pub refreshing: bool,
    pub roster: DeliveryRoster,
    pub profile: Option<VendorProfile>,
    pub assignment: Option<AssignmentDraft>,
    /// Assignment request in flight
    pub assigning: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    Initial,
    Refresh,
    /// Follow-up after a mutation or push event; touches no flags
    Reconcile,
}

impl LoadMode {
    fn finish(self, view: &mut OrdersState) {
        match self {
            LoadMode::Initial => view.loading = false,
            LoadMode::Refresh => view.refreshing = false,
            LoadMode::Reconcile => {}
        }
    }
}

struct Inner {
    view: OrdersState,
    notices: NoticeBoard,
}

pub struct OrderStateController {
    api: Arc<dyn PortalApi>,
    vendor_id: Option<String>,
    state: RwLock<Inner>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for OrderStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("OrderStateController")
            .field("vendor_id", &self.vendor_id)
            .field("orders", &inner.view.orders.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl OrderStateController {
    pub fn new(api: Arc<dyn PortalApi>) -> Self {
        Self {
            api,
            vendor_id: None,
            state: RwLock::new(Inner {
                view: OrdersState::default(),
                notices: NoticeBoard::default(),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Signed-in vendor; without it the vendor profile's id is used.
    pub fn with_vendor_id(mut self, vendor_id: impl Into<String>) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub fn with_notice_ttl(self, ttl: Duration) -> Self {
        Self {
            state: RwLock::new(Inner {
                view: OrdersState::default(),
                notices: NoticeBoard::new(ttl),
            }),
            ..self
        }
    }

    /// Tie the controller's lifetime to an outer token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    // ========== Internal helpers ==========

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the state unless the controller was shut down.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Option<R> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let mut inner = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut inner))
    }

    async fn call<T>(&self, request: impl Future<Output = ClientResult<T>>) -> OrderResult<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(OrderError::Cancelled),
            result = request => result.map_err(OrderError::from),
        }
    }

    fn notify_error(&self, error: &OrderError, context: &str) {
        let message = match error {
            OrderError::Cancelled => return,
            OrderError::Client(e) => format!("{context}: {}", e.user_message()),
            other => other.user_message(),
        };
        self.update(|inner| inner.notices.show(Notice::error(message)));
    }

    fn notify_success(&self, message: impl Into<String>) {
        let notice = Notice::success(message);
        self.update(|inner| inner.notices.show(notice));
    }

    fn effective_vendor_id(&self, view: &OrdersState) -> Option<String> {
        self.vendor_id.clone().or_else(|| {
            view.profile
                .as_ref()
                .map(|profile| profile.id.clone())
                .filter(|id| !id.is_empty())
        })
    }

    // ========== Orders ==========

    /// Load the order list. `is_refresh` marks a user refresh; a second one
    /// while the first is in flight fails with [`OrderError::Busy`].
    ///
    /// On failure the list is emptied and an error notice shown.
    pub async fn fetch_orders(&self, is_refresh: bool) -> OrderResult<usize> {
        let mode = if is_refresh {
            LoadMode::Refresh
        } else {
            LoadMode::Initial
        };
        self.load_orders(mode).await
    }

    async fn load_orders(&self, mode: LoadMode) -> OrderResult<usize> {
        let started = self.update(|inner| {
            let view = &mut inner.view;
            match mode {
                LoadMode::Refresh if view.refreshing => false,
                LoadMode::Refresh => {
                    view.refreshing = true;
                    true
                }
                LoadMode::Initial => {
                    view.loading = true;
                    true
                }
                LoadMode::Reconcile => true,
            }
        });
        match started {
            None => return Err(OrderError::Cancelled),
            Some(false) => {
                tracing::debug!("Refresh already in flight");
                return Err(OrderError::Busy);
            }
            Some(true) => {}
        }

        match self.call(self.api.list_orders()).await {
            Ok(orders) => {
                let count = orders.len();
                self.update(|inner| {
                    mode.finish(&mut inner.view);
                    inner.view.orders = orders;
                });
                tracing::debug!(count, ?mode, "Orders loaded");
                Ok(count)
            }
            Err(e) => {
                self.update(|inner| {
                    mode.finish(&mut inner.view);
                    inner.view.orders.clear();
                });
                tracing::error!(error = %e, "Failed to fetch orders");
                self.notify_error(&e, "Failed to fetch orders");
                Err(e)
            }
        }
    }

    /// Ask the backend to move an order to `new_status`.
    ///
    /// The backend decides; a transition outside the local table is only
    /// logged. On success the order is patched and the list reloaded.
    pub async fn handle_status_update(
        &self,
        order_id: &str,
        new_status: OrderStatus,
    ) -> OrderResult<()> {
        let current = self
            .read()
            .view
            .orders
            .iter()
            .find(|order| order.id == order_id)
            .map(|order| order.status);
        if let Some(current) = current
            && !current.can_transition_to(new_status)
        {
            tracing::warn!(order_id, %current, %new_status, "Status change not offered locally");
        }

        match self
            .call(self.api.update_order_status(order_id, new_status))
            .await
        {
            Ok(()) => {
                self.update(|inner| {
                    if let Some(order) = inner.view.orders.iter_mut().find(|o| o.id == order_id) {
                        order.status = new_status;
                    }
                });
                tracing::info!(order_id, %new_status, "Order status updated");
                self.notify_success(format!("Order status updated to {new_status}"));
                let _ = self.load_orders(LoadMode::Reconcile).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(order_id, error = %e, "Failed to update order status");
                self.notify_error(&e, "Failed to update order status");
                Err(e)
            }
        }
    }

    /// Statuses the vendor may move this order to.
    pub fn available_transitions(&self, order_id: &str) -> Vec<OrderStatus> {
        self.read()
            .view
            .orders
            .iter()
            .find(|order| order.id == order_id)
            .map(|order| order.status.allowed_transitions().to_vec())
            .unwrap_or_default()
    }

    // ========== Push integration ==========

    /// Merge pushed orders into the list.
    ///
    /// `new_order` prepends (or replaces by id), `order_updated` replaces by
    /// id; both then reload the list in the background. Listeners hold only
    /// a weak reference to the controller.
    pub fn attach(self: &Arc<Self>, client: &NotificationClient) -> Vec<ListenerHandle> {
        let on_new = {
            let controller = Arc::downgrade(self);
            client.add_listener(channel::NEW_ORDER, move |event| {
                if let (Some(controller), Some(order)) = (controller.upgrade(), event.order()) {
                    controller.upsert_order(order.clone());
                    controller.spawn_reconcile();
                }
            })
        };
        let on_update = {
            let controller = Arc::downgrade(self);
            client.add_listener(channel::ORDER_UPDATED, move |event| {
                if let (Some(controller), Some(order)) = (controller.upgrade(), event.order()) {
                    controller.replace_order(order.clone());
                    controller.spawn_reconcile();
                }
            })
        };
        vec![on_new, on_update]
    }

    /// Returns true when the order was new.
    pub fn upsert_order(&self, order: Order) -> bool {
        self.update(|inner| {
            let orders = &mut inner.view.orders;
            match orders.iter_mut().find(|existing| existing.id == order.id) {
                Some(existing) => {
                    *existing = order;
                    false
                }
                None => {
                    orders.insert(0, order);
                    true
                }
            }
        })
        .unwrap_or(false)
    }

    /// Returns false when no order has this id.
    pub fn replace_order(&self, order: Order) -> bool {
        self.update(|inner| {
            match inner
                .view
                .orders
                .iter_mut()
                .find(|existing| existing.id == order.id)
            {
                Some(existing) => {
                    *existing = order;
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
    }

    fn spawn_reconcile(self: &Arc<Self>) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime to reload orders on");
            return;
        };
        let controller = Arc::clone(self);
        runtime.spawn(async move {
            if let Err(e) = controller.load_orders(LoadMode::Reconcile).await {
                tracing::debug!(error = %e, "Reconciling reload failed");
            }
        });
    }

    // ========== Delivery assignment ==========

    /// Load the delivery team and split out who can take an order now.
    pub async fn fetch_available_delivery_boys(&self) -> OrderResult<DeliveryRoster> {
        match self.call(self.api.list_delivery_team()).await {
            Ok(members) => {
                let roster = DeliveryRoster::from_members(members);
                tracing::debug!(
                    total = roster.all.len(),
                    available = roster.available.len(),
                    "Delivery team loaded"
                );
                let snapshot = roster.clone();
                self.update(|inner| inner.view.roster = snapshot);
                Ok(roster)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch delivery boys");
                self.notify_error(&e, "Failed to fetch delivery boys");
                Err(e)
            }
        }
    }

    /// Load the signed-in vendor's profile (delivery model).
    pub async fn fetch_vendor_profile(&self) -> OrderResult<VendorProfile> {
        match self.call(self.api.vendor_profile()).await {
            Ok(profile) => {
                tracing::debug!(delivery_model = ?profile.delivery_model, "Vendor profile loaded");
                let snapshot = profile.clone();
                self.update(|inner| inner.view.profile = Some(snapshot));
                Ok(profile)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch vendor profile");
                self.notify_error(&e, "Failed to load vendor profile");
                Err(e)
            }
        }
    }

    /// Open the assignment draft for `order_id` and load the roster.
    pub async fn open_assignment(&self, order_id: &str) -> OrderResult<DeliveryRoster> {
        let known = self
            .update(|inner| {
                let known = inner.view.orders.iter().any(|order| order.id == order_id);
                if known {
                    inner.view.assignment = Some(AssignmentDraft::new(order_id));
                }
                known
            })
            .ok_or(OrderError::Cancelled)?;
        if !known {
            let e = OrderError::NotFound(order_id.to_string());
            self.notify_error(&e, "");
            return Err(e);
        }
        self.fetch_available_delivery_boys().await
    }

    /// Returns false when no draft is open.
    pub fn select_delivery_boy(&self, delivery_boy_id: &str) -> bool {
        self.update(|inner| match inner.view.assignment.as_mut() {
            Some(draft) => {
                draft.selected = Some(delivery_boy_id.to_string());
                true
            }
            None => false,
        })
        .unwrap_or(false)
    }

    pub fn close_assignment(&self) {
        self.update(|inner| inner.view.assignment = None);
    }

    /// Submit the open draft.
    pub async fn assign_selected(&self) -> OrderResult<()> {
        let draft = self.read().view.assignment.clone();
        let Some(draft) = draft else {
            let e = OrderError::Validation("No assignment in progress".to_string());
            self.notify_error(&e, "");
            return Err(e);
        };
        let selected = draft.selected.unwrap_or_default();
        self.handle_assign_delivery(&draft.order_id, &selected).await
    }

    /// Assign a delivery person to an order.
    ///
    /// Rejected locally, without a request, unless a delivery person is
    /// chosen, the order is known, the vendor delivers itself and the order
    /// is confirmed, processing or packed. On success the draft closes and
    /// the list reloads; on failure the draft stays open.
    pub async fn handle_assign_delivery(
        &self,
        order_id: &str,
        delivery_boy_id: &str,
    ) -> OrderResult<()> {
        let check = {
            let inner = self.read();
            let order = inner.view.orders.iter().find(|order| order.id == order_id);
            let profile_model = inner
                .view
                .profile
                .as_ref()
                .map(|profile| profile.delivery_model)
                .unwrap_or(DeliveryModel::Unknown);
            let vendor_id = self.effective_vendor_id(&inner.view);
            validate_assignment(
                order_id,
                order,
                delivery_boy_id,
                vendor_id.as_deref(),
                profile_model,
            )
        };
        if let Err(e) = check {
            tracing::debug!(order_id, error = %e, "Assignment rejected locally");
            self.notify_error(&e, "");
            return Err(e);
        }

        let started = self
            .update(|inner| !std::mem::replace(&mut inner.view.assigning, true))
            .ok_or(OrderError::Cancelled)?;
        if !started {
            return Err(OrderError::Busy);
        }

        let result = self
            .call(self.api.assign_delivery_boy(order_id, delivery_boy_id))
            .await;
        self.update(|inner| inner.view.assigning = false);

        match result {
            Ok(()) => {
                tracing::info!(order_id, delivery_boy_id, "Delivery boy assigned");
                self.update(|inner| inner.view.assignment = None);
                self.notify_success("Delivery boy assigned successfully");
                let _ = self.load_orders(LoadMode::Reconcile).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(order_id, error = %e, "Failed to assign delivery boy");
                self.notify_error(&e, "Failed to assign delivery boy");
                Err(e)
            }
        }
    }

    // ========== Views ==========

    pub fn snapshot(&self) -> OrdersState {
        self.read().view.clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.read().view.orders.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read().view.loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.read().view.refreshing
    }

    pub fn assignment(&self) -> Option<AssignmentDraft> {
        self.read().view.assignment.clone()
    }

    /// The visible notice, if it has not expired
    pub fn notice(&self) -> Option<Notice> {
        self.read().notices.current().cloned()
    }

    pub fn dismiss_notice(&self) {
        self.update(|inner| inner.notices.dismiss());
    }

    pub fn filtered_orders(&self, filter: &OrderFilter) -> Vec<Order> {
        self.filtered_orders_at(filter, &Local::now())
    }

    pub fn filtered_orders_at<Tz: TimeZone>(
        &self,
        filter: &OrderFilter,
        now: &DateTime<Tz>,
    ) -> Vec<Order> {
        let inner = self.read();
        filter
            .apply(&inner.view.orders, now)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Stats over the full list, "today" being the local calendar day
    pub fn stats(&self) -> OrderStats {
        OrderStats::compute(&self.read().view.orders, &Local::now())
    }

    /// Stats over the orders `filter` lets through
    pub fn filtered_stats(&self, filter: &OrderFilter) -> OrderStats {
        let now = Local::now();
        let inner = self.read();
        OrderStats::compute(filter.apply(&inner.view.orders, &now), &now)
    }

    // ========== Lifecycle ==========

    /// Stop all in-flight work; later results are discarded.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Order controller shutting down");
        }
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
