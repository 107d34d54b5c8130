use counselpay::gateway::paystack::{ChargeData, PaystackEvent, TransferData};
use counselpay::gateway::stripe::StripeEvent;
use counselpay::money;
use serde_json::json;
use std::str::FromStr;

#[test]
fn test_stripe_checkout_completed_payload() {
    let payload = json!({
        "id": "evt_1PabcDEF",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_a1b2c3",
                "payment_intent": "pi_3Pxyz",
                "amount_total": 10000,
                "metadata": {
                    "internalSessionId": "7f8e1f64-9f14-4f7e-9f69-0e1dd5f1a001"
                }
            }
        }
    });

    let event: StripeEvent = serde_json::from_value(payload).unwrap();

    assert_eq!(event.event_type, "checkout.session.completed");
    assert_eq!(event.data.object.id, "cs_test_a1b2c3");
    assert_eq!(event.data.object.payment_intent.as_deref(), Some("pi_3Pxyz"));
    assert_eq!(event.data.object.amount_total, Some(10000));
    assert_eq!(
        event.data.object.metadata.get("internalSessionId").map(String::as_str),
        Some("7f8e1f64-9f14-4f7e-9f69-0e1dd5f1a001")
    );
}

#[test]
fn test_stripe_payload_without_metadata() {
    let payload = json!({
        "id": "evt_2",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_nometa",
                "payment_intent": null,
                "amount_total": 500
            }
        }
    });

    let event: StripeEvent = serde_json::from_value(payload).unwrap();

    assert!(event.data.object.metadata.is_empty());
    assert!(event.data.object.payment_intent.is_none());
}

#[test]
fn test_paystack_charge_success_payload() {
    let payload = json!({
        "event": "charge.success",
        "data": {
            "id": 302961,
            "reference": "7f8e1f649f144f7e9f690e1dd5f1a001",
            "amount": 500000,
            "currency": "NGN",
            "status": "success"
        }
    });

    let event: PaystackEvent = serde_json::from_value(payload).unwrap();
    assert_eq!(event.event, "charge.success");

    let charge: ChargeData = serde_json::from_value(event.data).unwrap();
    assert_eq!(charge.reference, "7f8e1f649f144f7e9f690e1dd5f1a001");
    assert_eq!(charge.amount, 500_000);
    assert_eq!(charge.id, Some(302961));
}

#[test]
fn test_paystack_transfer_reversed_payload() {
    let payload = json!({
        "event": "transfer.reversed",
        "data": {
            "transfer_code": "TRF_1ptvuv321ahaa7q",
            "reference": "wd-8f7a2b",
            "reason": "Provider could not settle",
            "status": "reversed",
            "amount": 500000
        }
    });

    let event: PaystackEvent = serde_json::from_value(payload).unwrap();
    let transfer: TransferData = serde_json::from_value(event.data).unwrap();

    assert_eq!(transfer.transfer_code, "TRF_1ptvuv321ahaa7q");
    assert_eq!(transfer.reason.as_deref(), Some("Provider could not settle"));
}

#[test]
fn test_transfer_payload_with_sparse_fields() {
    // Paystack omits reason on success events
    let data = json!({ "transfer_code": "TRF_ok" });
    let transfer: TransferData = serde_json::from_value(data).unwrap();

    assert_eq!(transfer.transfer_code, "TRF_ok");
    assert!(transfer.reason.is_none());
    assert!(transfer.reference.is_none());
}

#[test]
fn test_webhook_amount_maps_back_to_major_units() {
    // 500000 kobo reported by the gateway is the 5000 NGN the session costs
    let price = bigdecimal::BigDecimal::from_str("5000").unwrap();
    assert_eq!(money::to_minor_units(&price).unwrap(), 500_000);
    assert_eq!(money::to_major_units(500_000), bigdecimal::BigDecimal::from_str("5000.00").unwrap());
}
