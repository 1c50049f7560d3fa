//! Data types that are persisted by, or passed into, the settlement backends.
//!
//! Monetary columns are always integer [`Cents`]. Status columns are stored as their snake_case text form.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
pub use cod_common::{Cents, CommissionSplit, Rate};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

/// Generates `as_str`, `Display` and `FromStr` for a text-backed status enum. The strings must match the
/// `rename_all = "snake_case"` encoding used by sqlx.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError { kind: stringify!($name), value: s.to_string() }),
                }
            }
        }
    };
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The opaque order reference assigned by the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Newly placed at checkout, awaiting confirmation.
    Pending,
    Confirmed,
    /// Being prepared by the vendors.
    Processing,
    /// Handed to a delivery person.
    OutForDelivery,
    /// Handed over to the customer and cash collected.
    Delivered,
    Completed,
    Cancelled,
    /// Delivery was abandoned.
    Failed,
    /// Set by the external refunds flow.
    Refunded,
}

text_enum!(OrderStatusType {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Completed => "completed",
    Cancelled => "cancelled",
    Failed => "failed",
    Refunded => "refunded",
});

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 9] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Completed,
        Self::Cancelled,
        Self::Failed,
        Self::Refunded,
    ];

    /// Completed, cancelled and refunded orders accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Other,
}

text_enum!(PaymentMethod { Cod => "cod", Other => "other" });

//--------------------------------------  FulfillmentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Unfulfilled,
    Preparing,
    Dispatched,
    Fulfilled,
}

text_enum!(FulfillmentStatus {
    Unfulfilled => "unfulfilled",
    Preparing => "preparing",
    Dispatched => "dispatched",
    Fulfilled => "fulfilled",
});

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    pub total_price: Cents,
    pub currency: String,
    pub status: OrderStatusType,
    pub fulfillment_status: FulfillmentStatus,
    pub delivery_person_id: Option<i64>,
    pub cod_collected_at: Option<DateTime<Utc>>,
    pub cod_amount_collected: Option<Cents>,
    pub cod_collected_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_cod(&self) -> bool {
        self.payment_method == PaymentMethod::Cod
    }

    pub fn is_cod_collected(&self) -> bool {
        self.cod_collected_at.is_some()
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// The order reference as assigned by the storefront
    pub order_id: OrderId,
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    /// The total the customer pays, including any COD surcharge
    pub total_price: Cents,
    pub currency: String,
    pub items: Vec<NewOrderItem>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_id: String, total_price: Cents) -> Self {
        Self {
            order_id,
            customer_id,
            payment_method: PaymentMethod::Cod,
            total_price,
            currency: "USD".to_string(),
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Sum of the line totals. This is not required to equal `total_price`, which may include surcharges.
    /// `None` if the sum does not fit in an `i64`.
    pub fn items_total(&self) -> Option<Cents> {
        self.items.iter().try_fold(Cents::ZERO, |total, item| total.checked_add(item.line_total()?))
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub vendor_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub price_at_purchase: Cents,
}

impl OrderItem {
    /// `None` if the line total does not fit in an `i64`.
    pub fn line_total(&self) -> Option<Cents> {
        self.price_at_purchase.checked_times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub vendor_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub price_at_purchase: Cents,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(vendor_id: i64, product_name: S, quantity: i64, price_at_purchase: Cents) -> Self {
        Self { vendor_id, product_name: product_name.into(), quantity, price_at_purchase }
    }

    /// `None` if the line total does not fit in an `i64`.
    pub fn line_total(&self) -> Option<Cents> {
        self.price_at_purchase.checked_times(self.quantity)
    }
}

//--------------------------------------   OrderStatusEntry    ---------------------------------------------------------
/// An append-only audit row written for every successful status transition.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderStatusEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub actor_id: Option<i64>,
    pub status: OrderStatusType,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   OrderAnnotation     ---------------------------------------------------------
/// Typed audit annotations attached to an order by specific transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderAnnotation {
    Cancellation(CancellationInfo),
    DeliveryFailure(DeliveryFailureInfo),
    CodCollection(CodCollectionInfo),
}

impl OrderAnnotation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cancellation(_) => "cancellation",
            Self::DeliveryFailure(_) => "delivery_failure",
            Self::CodCollection(_) => "cod_collection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationInfo {
    pub reason: String,
    pub actor_id: Option<i64>,
    pub previous_status: OrderStatusType,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailureInfo {
    pub reason: String,
    pub attempt: u32,
    pub delivery_person_id: Option<i64>,
    pub rescheduled: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodCollectionInfo {
    pub amount: Cents,
    /// The order total at the time of collection. Differences are settled by reconciliation.
    pub expected: Cents,
    pub collected_by: Option<i64>,
    pub at: DateTime<Utc>,
}

//--------------------------------------    EarningStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
    /// Inside the hold period
    Pending,
    Available,
    Withheld,
    /// Reserved by a payout request
    Processing,
    Paid,
}

text_enum!(EarningStatus {
    Pending => "pending",
    Available => "available",
    Withheld => "withheld",
    Processing => "processing",
    Paid => "paid",
});

//--------------------------------------    VendorEarning      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VendorEarning {
    pub id: i64,
    pub vendor_id: i64,
    pub order_id: OrderId,
    /// Gross sales attributable to the vendor
    pub amount: Cents,
    pub commission: Cents,
    pub net_amount: Cents,
    pub status: EarningStatus,
    pub available_at: DateTime<Utc>,
    pub withheld_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VendorEarning {
    pub fn split(&self) -> CommissionSplit {
        CommissionSplit { gross: self.amount, commission: self.commission, net: self.net_amount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVendorEarning {
    pub vendor_id: i64,
    pub order_id: OrderId,
    pub split: CommissionSplit,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    VendorBalance      ---------------------------------------------------------
/// Net earnings of a vendor, bucketed by earning status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorBalance {
    pub vendor_id: i64,
    pub pending: Cents,
    pub available: Cents,
    pub withheld: Cents,
    pub processing: Cents,
    pub paid: Cents,
}

impl VendorBalance {
    pub fn new(vendor_id: i64) -> Self {
        Self { vendor_id, ..Default::default() }
    }

    pub fn add(&mut self, status: EarningStatus, amount: Cents) {
        let bucket = match status {
            EarningStatus::Pending => &mut self.pending,
            EarningStatus::Available => &mut self.available,
            EarningStatus::Withheld => &mut self.withheld,
            EarningStatus::Processing => &mut self.processing,
            EarningStatus::Paid => &mut self.paid,
        };
        *bucket = *bucket + amount;
    }

    pub fn lifetime_total(&self) -> Cents {
        self.pending + self.available + self.withheld + self.processing + self.paid
    }
}

//--------------------------------------     PayoutStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

text_enum!(PayoutStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

//--------------------------------------        Payout         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    /// Unique human-facing payout reference, e.g. `PO-12-20240105093000-1a2b3c`
    pub payout_id: String,
    pub vendor_id: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub items_count: i64,
    /// The amount requested by the vendor
    pub amount: Cents,
    /// Sum of the net amounts of the earnings reserved for this payout. Earnings are reserved whole, so this can be
    /// larger than `amount`.
    pub reserved_amount: Cents,
    pub processing_fee: Cents,
    pub net_amount: Cents,
    pub status: PayoutStatus,
    pub payout_details: Json<PayoutDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    /// The portion of the reserved earnings that exceeds the requested amount.
    pub fn overshoot(&self) -> Cents {
        self.reserved_amount - self.amount
    }

    pub fn details(&self) -> &PayoutDetails {
        &self.payout_details.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDetails {
    pub requested_by: Option<i64>,
    /// Reference of the bank transfer that settled the payout
    pub transfer_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub retries: u32,
    pub processed_by: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayoutRequest {
    pub payout_id: String,
    pub vendor_id: i64,
    pub amount: Cents,
    pub processing_fee: Cents,
    pub requested_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl NewPayoutRequest {
    pub fn net_amount(&self) -> Cents {
        self.amount - self.processing_fee
    }
}

//--------------------------------------  ReconciliationStatus ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Pending,
    Verified,
    Disputed,
    Resolved,
}

text_enum!(ReconciliationStatus {
    Pending => "pending",
    Verified => "verified",
    Disputed => "disputed",
    Resolved => "resolved",
});

//--------------------------------------   CodReconciliation   ---------------------------------------------------------
/// The daily cash audit for one delivery person.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CodReconciliation {
    pub id: i64,
    pub date: NaiveDate,
    pub delivery_person_id: i64,
    pub total_orders_count: i64,
    /// The cash the delivery person was expected to collect
    pub total_cod_amount: Cents,
    /// The cash the delivery person actually handed over
    pub collected_amount: Cents,
    /// `collected_amount - total_cod_amount`
    pub discrepancy: Cents,
    pub status: ReconciliationStatus,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ReconciliationNote {
    pub id: i64,
    pub reconciliation_id: i64,
    pub actor_id: Option<i64>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     ActivityLog       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub actor_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub properties: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewActivity {
    pub fn new<A: Into<String>, T: Into<String>, I: Display>(
        actor_id: Option<i64>,
        action: A,
        entity_type: T,
        entity_id: I,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor_id,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            properties: serde_json::Value::Null,
            created_at,
        }
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub actor_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub properties: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
