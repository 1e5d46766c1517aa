use async_trait::async_trait;
use serde_json::json;

use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::orders::{FoodOrderContext, OrderStatus, VendorOption, WorkflowStep};
use crate::schema::slots;
use crate::state::StateSnapshot;

/// Conversational responder for the steps that need dialogue rather than an
/// external call: requirement gathering, vendor selection, order tracking,
/// and everything that is not a food order at all.
pub struct ExecutorNode;

/// First integer that reads as a group size ("for 12", "12 people").
pub fn parse_headcount(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        let cleaned = token.trim_matches(|c: char| !c.is_ascii_digit());
        let Ok(n) = cleaned.parse::<u32>() else {
            continue;
        };
        if n == 0 || n > 10_000 {
            continue;
        }
        let next = tokens.get(i + 1).copied().unwrap_or("");
        let prev = if i > 0 { tokens[i - 1] } else { "" };
        if next.starts_with("people") || next.starts_with("person") || next.starts_with("folks") {
            return Some(n);
        }
        if prev == "for" {
            return Some(n);
        }
    }
    None
}

/// Dollar amounts: "$500" is a total budget, "$25/person" (or "$25 per
/// person") is per-person.
pub fn parse_budgets(text: &str) -> (Option<f64>, Option<f64>) {
    let lowered = text.to_lowercase();
    let mut total = None;
    let mut per_person = None;
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        let Some(rest) = token.strip_prefix('$') else {
            continue;
        };
        let amount_str: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let Ok(amount) = amount_str.parse::<f64>() else {
            continue;
        };
        let next = tokens.get(i + 1).copied().unwrap_or("");
        let inline_pp = rest.contains("/person") || rest.contains("/pp");
        let worded_pp = next == "per" || next.starts_with("each");
        if inline_pp || worded_pp {
            per_person = Some(amount);
        } else {
            total = Some(amount);
        }
    }
    (total, per_person)
}

/// First ISO-looking date token (YYYY-MM-DD).
pub fn parse_event_date(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_digit() && c != '-'))
        .find(|t| {
            t.len() == 10
                && t.chars().enumerate().all(|(i, c)| match i {
                    4 | 7 => c == '-',
                    _ => c.is_ascii_digit(),
                })
        })
        .map(|t| t.to_string())
}

/// Address after a "deliver to"/"address:" marker, up to end of sentence.
pub fn parse_address(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    let start = ["deliver to ", "delivery to ", "address: ", "address is "]
        .iter()
        .find_map(|marker| lowered.find(marker).map(|idx| idx + marker.len()))?;
    let rest = &text[start..];
    let end = rest.find(['.', ';', '\n']).unwrap_or(rest.len());
    let address = rest[..end].trim();
    (!address.is_empty()).then(|| address.to_string())
}

/// Resolve a vendor choice from "2" / "number 2" / a name fragment.
pub fn parse_vendor_selection<'a>(
    text: &str,
    options: &'a [VendorOption],
) -> Option<&'a VendorOption> {
    let lowered = text.to_lowercase();
    for token in lowered.split_whitespace() {
        let cleaned = token.trim_matches(|c: char| !c.is_ascii_digit());
        if let Ok(n) = cleaned.parse::<usize>() {
            if n >= 1 && n <= options.len() {
                return Some(&options[n - 1]);
            }
        }
    }
    options
        .iter()
        .find(|v| lowered.contains(&v.name.to_lowercase()))
}

fn gather_requirements(
    order: &mut FoodOrderContext,
    text: &str,
    ctx: &NodeContext,
) -> Result<String, NodeError> {
    if let Some(headcount) = parse_headcount(text) {
        order.headcount = Some(headcount);
    }
    let (total, per_person) = parse_budgets(text);
    if total.is_some() {
        order.budget_total = total;
    }
    if per_person.is_some() {
        order.budget_per_person = per_person;
    }
    if let Some(date) = parse_event_date(text) {
        order.event_date = Some(date);
    }
    if let Some(address) = parse_address(text) {
        order.delivery_address = Some(address);
    }

    let missing = order.missing_requirements();
    if missing.is_empty() {
        ctx.emit("executor", "requirements complete")?;
        order.complete_step(WorkflowStep::GatherRequirements, WorkflowStep::SearchVendors);
        Ok("Great, I have everything I need. I'll look for restaurant options next — just say go."
            .to_string())
    } else {
        Ok(format!(
            "A few details before I can search: please share the {}.",
            missing.join(", ")
        ))
    }
}

fn select_vendor(order: &mut FoodOrderContext, text: &str) -> String {
    match parse_vendor_selection(text, &order.vendor_options) {
        Some(vendor) => {
            let name = vendor.name.clone();
            order.selected_vendor = Some(vendor.clone());
            order.complete_step(WorkflowStep::SelectVendor, WorkflowStep::BuildOrder);
            format!("{name} it is. I'll put an order together next.")
        }
        None if order.vendor_options.is_empty() => {
            "I don't have any restaurant options yet — let me search first.".to_string()
        }
        None => {
            "Which restaurant would you like? Tell me the number or the name from the list."
                .to_string()
        }
    }
}

#[async_trait]
impl Node for ExecutorNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let text = snapshot
            .last_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let Some(mut order) = snapshot.food_order() else {
            // Nothing food-related in play: plain conversational reply.
            let reply = match snapshot.intent().as_deref() {
                Some("reservation") => {
                    "I can help with restaurant reservations — tell me the date, time, and party size."
                }
                Some("budget") => "I can summarize food spend once an order is in progress.",
                _ => "Hi! I can plan group food orders — tell me what you need and for how many people.",
            };
            return Ok(NodePartial::new().with_messages(vec![Message::assistant(reply)]));
        };

        let reply = match order.current_step {
            WorkflowStep::GatherRequirements => gather_requirements(&mut order, &text, &ctx)?,
            WorkflowStep::SelectVendor => select_vendor(&mut order, &text),
            WorkflowStep::TrackOrder => match order.status {
                OrderStatus::PendingApproval => {
                    "The order is submitted and waiting on approval.".to_string()
                }
                status => format!("Current order status: {status:?}."),
            },
            step => format!(
                "We're at the {step} step. Tell me what you'd like to change, or say which step to jump to."
            ),
        };

        Ok(NodePartial::new()
            .with_messages(vec![Message::assistant(&reply)])
            .with_slot(slots::FOOD_ORDER, json!(order)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headcount_variants() {
        assert_eq!(parse_headcount("lunch for 12 tomorrow"), Some(12));
        assert_eq!(parse_headcount("we are 8 people"), Some(8));
        assert_eq!(parse_headcount("no numbers here"), None);
    }

    #[test]
    fn parses_budget_total_and_per_person() {
        let (total, pp) = parse_budgets("keep it under $500 total, about $25 per person");
        assert_eq!(total, Some(500.0));
        assert_eq!(pp, Some(25.0));

        let (total, pp) = parse_budgets("budget is $30/person");
        assert_eq!(total, None);
        assert_eq!(pp, Some(30.0));
    }

    #[test]
    fn parses_iso_date_and_address() {
        assert_eq!(
            parse_event_date("deliver on 2026-09-01 please"),
            Some("2026-09-01".to_string())
        );
        assert_eq!(
            parse_address("deliver to 500 Howard St, San Francisco. Thanks!"),
            Some("500 Howard St, San Francisco".to_string())
        );
    }

    #[test]
    fn vendor_selection_by_number_and_name() {
        let options = vec![
            VendorOption {
                vendor_id: "a".into(),
                name: "Thai Basil".into(),
                rating: Some(4.5),
                price_level: None,
                address: None,
                phone: None,
                categories: vec![],
                source: "yelp".into(),
                distance_miles: None,
            },
            VendorOption {
                vendor_id: "b".into(),
                name: "Saffron House".into(),
                rating: Some(4.7),
                price_level: None,
                address: None,
                phone: None,
                categories: vec![],
                source: "places".into(),
                distance_miles: None,
            },
        ];
        assert_eq!(
            parse_vendor_selection("let's do number 2", &options).map(|v| v.name.as_str()),
            Some("Saffron House")
        );
        assert_eq!(
            parse_vendor_selection("thai basil please", &options).map(|v| v.name.as_str()),
            Some("Thai Basil")
        );
        assert!(parse_vendor_selection("the other one", &options).is_none());
    }
}
