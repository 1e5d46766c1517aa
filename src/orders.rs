//! Domain model for the food-order workflow.
//!
//! The step machine is table-driven: [`WorkflowStep::ORDERED`] fixes the
//! forward sequence, [`STEP_ROUTING`] maps each step to the node that owns
//! it, and [`STEP_JUMP_TABLE`] maps an explicit user-requested step to its
//! side-entry node. Routing predicates consult these tables; the graph
//! itself stays acyclic — the build/review back edge exists only here,
//! as data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Position in the food-order workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    GatherRequirements,
    SearchVendors,
    SelectVendor,
    BuildOrder,
    ReviewOrder,
    ConfirmOrder,
    SubmitOrder,
    TrackOrder,
}

impl WorkflowStep {
    /// The required forward order of steps.
    pub const ORDERED: [WorkflowStep; 8] = [
        WorkflowStep::GatherRequirements,
        WorkflowStep::SearchVendors,
        WorkflowStep::SelectVendor,
        WorkflowStep::BuildOrder,
        WorkflowStep::ReviewOrder,
        WorkflowStep::ConfirmOrder,
        WorkflowStep::SubmitOrder,
        WorkflowStep::TrackOrder,
    ];

    /// The next step in the forward sequence, if any.
    #[must_use]
    pub fn next(self) -> Option<WorkflowStep> {
        let idx = Self::ORDERED.iter().position(|s| *s == self)?;
        Self::ORDERED.get(idx + 1).copied()
    }

    /// Whether moving from `self` to `to` is an allowed transition:
    /// any forward move, or the single backward edge review -> build.
    #[must_use]
    pub fn allows_transition_to(self, to: WorkflowStep) -> bool {
        if self == WorkflowStep::ReviewOrder && to == WorkflowStep::BuildOrder {
            return true;
        }
        let from_idx = Self::ORDERED.iter().position(|s| *s == self);
        let to_idx = Self::ORDERED.iter().position(|s| *s == to);
        matches!((from_idx, to_idx), (Some(f), Some(t)) if t >= f)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::GatherRequirements => "gather_requirements",
            WorkflowStep::SearchVendors => "search_vendors",
            WorkflowStep::SelectVendor => "select_vendor",
            WorkflowStep::BuildOrder => "build_order",
            WorkflowStep::ReviewOrder => "review_order",
            WorkflowStep::ConfirmOrder => "confirm_order",
            WorkflowStep::SubmitOrder => "submit_order",
            WorkflowStep::TrackOrder => "track_order",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node that owns each step during normal sequencing.
pub const STEP_ROUTING: [(WorkflowStep, &str); 8] = [
    (WorkflowStep::GatherRequirements, "executor"),
    (WorkflowStep::SearchVendors, "vendor_search"),
    (WorkflowStep::SelectVendor, "executor"),
    (WorkflowStep::BuildOrder, "order_builder"),
    (WorkflowStep::ReviewOrder, "order_validator"),
    (WorkflowStep::ConfirmOrder, "order_submit"),
    (WorkflowStep::SubmitOrder, "order_submit"),
    (WorkflowStep::TrackOrder, "executor"),
];

/// Side entries honored when the turn input carries an explicit requested
/// step, bypassing normal sequencing.
pub const STEP_JUMP_TABLE: [(WorkflowStep, &str); 5] = [
    (WorkflowStep::SearchVendors, "vendor_search"),
    (WorkflowStep::BuildOrder, "order_builder"),
    (WorkflowStep::ReviewOrder, "order_validator"),
    (WorkflowStep::ConfirmOrder, "order_submit"),
    (WorkflowStep::SubmitOrder, "order_submit"),
];

/// Node owning a step under normal sequencing.
#[must_use]
pub fn node_for_step(step: WorkflowStep) -> &'static str {
    STEP_ROUTING
        .iter()
        .find(|(s, _)| *s == step)
        .map(|(_, node)| *node)
        .unwrap_or("executor")
}

/// Side-entry node for an explicit requested step, if the step supports it.
#[must_use]
pub fn jump_node_for_step(step: WorkflowStep) -> Option<&'static str> {
    STEP_JUMP_TABLE
        .iter()
        .find(|(s, _)| *s == step)
        .map(|(_, node)| *node)
}

/// Order lifecycle from draft through delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Draft,
    PendingApproval,
    Submitted,
    Accepted,
    Preparing,
    InTransit,
    Delivered,
    Cancelled,
}

/// A vendor surfaced by search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorOption {
    pub vendor_id: String,
    pub name: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub price_level: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Which search source produced this option.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub distance_miles: Option<f64>,
}

/// A line item on the order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default = "new_id")]
    pub item_id: String,
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
    pub price: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn one() -> u32 {
    1
}

/// Approval lifecycle of a pending action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// An action waiting for human approval.
///
/// The engine only creates and stores these; resolution arrives on a later
/// turn's input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    #[serde(default = "new_id")]
    pub action_id: String,
    pub action_type: String,
    pub description: String,
    pub payload: Value,
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(action_type: impl Into<String>, description: impl Into<String>, payload: Value) -> Self {
        Self {
            action_id: new_id(),
            action_type: action_type.into(),
            description: description.into(),
            payload,
            status: ActionStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Long-term user food preferences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct UserPreferences {
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub favorite_cuisines: Vec<String>,
    #[serde(default)]
    pub disliked_cuisines: Vec<String>,
    #[serde(default)]
    pub spice_preference: Option<String>,
    #[serde(default)]
    pub default_budget_per_person: Option<f64>,
    #[serde(default)]
    pub favorite_vendors: Vec<String>,
}

impl UserPreferences {
    /// Whether any preference is actually set.
    #[must_use]
    pub fn has_preferences(&self) -> bool {
        !self.dietary_restrictions.is_empty()
            || !self.allergies.is_empty()
            || !self.favorite_cuisines.is_empty()
            || !self.disliked_cuisines.is_empty()
            || self.spice_preference.is_some()
            || self.default_budget_per_person.is_some()
            || !self.favorite_vendors.is_empty()
    }
}

/// Tracks an active food order through the workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoodOrderContext {
    #[serde(default = "new_id")]
    pub order_id: String,

    pub current_step: WorkflowStep,
    #[serde(default)]
    pub completed_steps: Vec<WorkflowStep>,

    // Requirements
    #[serde(default)]
    pub headcount: Option<u32>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub budget_total: Option<f64>,
    #[serde(default)]
    pub budget_per_person: Option<f64>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub cuisine_preferences: Vec<String>,

    // Vendor search & selection
    #[serde(default)]
    pub vendor_options: Vec<VendorOption>,
    #[serde(default)]
    pub selected_vendor: Option<VendorOption>,

    // Order details
    #[serde(default)]
    pub line_items: Vec<OrderItem>,
    #[serde(default)]
    pub special_instructions: Option<String>,

    // Pricing
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub tax: Option<f64>,
    #[serde(default)]
    pub delivery_fee: Option<f64>,
    #[serde(default)]
    pub service_fee: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,

    // Validation results
    #[serde(default)]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub validation_warnings: Vec<String>,
    /// Set when the builder has already re-fit this order after a failed
    /// review; bounds the build/review loop within one turn.
    #[serde(default)]
    pub rebuild_attempted: bool,

    // Lifecycle
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Default for FoodOrderContext {
    fn default() -> Self {
        Self {
            order_id: new_id(),
            current_step: WorkflowStep::GatherRequirements,
            completed_steps: Vec::new(),
            headcount: None,
            event_date: None,
            event_time: None,
            delivery_address: None,
            budget_total: None,
            budget_per_person: None,
            dietary_restrictions: Vec::new(),
            cuisine_preferences: Vec::new(),
            vendor_options: Vec::new(),
            selected_vendor: None,
            line_items: Vec::new(),
            special_instructions: None,
            subtotal: None,
            tax: None,
            delivery_fee: None,
            service_fee: None,
            total: None,
            validation_errors: Vec::new(),
            validation_warnings: Vec::new(),
            rebuild_attempted: false,
            status: OrderStatus::Draft,
            created_at: Utc::now(),
            submitted_at: None,
        }
    }
}

impl FoodOrderContext {
    /// Mark `step` completed (idempotent) and move `current_step` to `next`.
    pub fn complete_step(&mut self, step: WorkflowStep, next: WorkflowStep) {
        if !self.completed_steps.contains(&step) {
            self.completed_steps.push(step);
        }
        self.current_step = next;
    }

    /// Per-person cost of the current total, when both parts are known.
    #[must_use]
    pub fn per_person_cost(&self) -> Option<f64> {
        let total = self.total?;
        let headcount = self.headcount.filter(|h| *h > 0)?;
        Some(total / headcount as f64)
    }

    /// Requirement fields still missing for a valid order.
    #[must_use]
    pub fn missing_requirements(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.headcount.unwrap_or(0) < 1 {
            missing.push("headcount");
        }
        if self.delivery_address.is_none() {
            missing.push("delivery address");
        }
        if self.event_date.is_none() {
            missing.push("delivery date");
        }
        missing
    }

    /// Fold stored preferences into unset requirement fields.
    pub fn apply_preferences(&mut self, prefs: &UserPreferences) {
        if self.dietary_restrictions.is_empty() && !prefs.dietary_restrictions.is_empty() {
            self.dietary_restrictions = prefs.dietary_restrictions.clone();
        }
        if self.cuisine_preferences.is_empty() && !prefs.favorite_cuisines.is_empty() {
            self.cuisine_preferences = prefs.favorite_cuisines.clone();
        }
        if self.budget_per_person.is_none() {
            self.budget_per_person = prefs.default_budget_per_person;
        }
    }
}

/// Merge vendor options from multiple sources: dedup on the normalized name
/// key, sort by rating descending with missing ratings last, keep `limit`.
#[must_use]
pub fn merge_vendor_options(batches: Vec<Vec<VendorOption>>, limit: usize) -> Vec<VendorOption> {
    let mut seen = rustc_hash::FxHashSet::default();
    let mut merged: Vec<VendorOption> = Vec::new();
    for batch in batches {
        for vendor in batch {
            let key = vendor.name.trim().to_lowercase();
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            merged.push(vendor);
        }
    }
    merged.sort_by(|a, b| match (a.rating, b.rating) {
        (Some(ra), Some(rb)) => rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    merged.truncate(limit);
    merged
}
