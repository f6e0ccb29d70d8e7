mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use zkp_visa_backend::admin::NOT_AUTHORIZED;
use zkp_visa_backend::config::Simulation;
use zkp_visa_backend::issuer::Issuer;
use zkp_visa_backend::registry::{Address, LocalRegistry, VisaRegistry};

#[tokio::test]
async fn health() {
    let app = local_app().await;
    let (status, body, _) = app.raw(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn full_local_flow_issues_a_credential() {
    let app = local_app().await;

    let (status, s) = app.call(Method::POST, "/api/v1/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(s["screen"], "home");
    assert_eq!(s["step"], 1);
    assert_eq!(s["totalSteps"], 5);
    let id = s["sessionId"].as_str().unwrap().to_string();

    let (_, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/start"), None).await;
    assert_eq!(s["screen"], "fillInfo");

    let (_, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/info"), Some(user_data())).await;
    assert_eq!(s["screen"], "uploadDocuments");
    assert_eq!(s["missingDocuments"], json!(["id", "selfie"]));

    let (status, s) = app
        .call(
            Method::PUT,
            &format!("/api/v1/sessions/{id}/documents/id"),
            Some(json!({"name": "passport.pdf", "type": "application/pdf", "size": 120000})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(s["missingDocuments"], json!(["selfie"]));

    let (_, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/sample"), None).await;
    assert_eq!(s["documents"].as_array().unwrap().len(), 2);
    assert_eq!(s["documents"][0]["name"], "government_id.pdf");

    let (_, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/verify"), None).await;
    assert_eq!(s["verificationStatus"], "success");

    let (_, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/continue"), None).await;
    assert_eq!(s["screen"], "payment");

    let (status, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/payment"), Some(card())).await;
    assert_eq!(status, StatusCode::OK, "{s}");
    assert_eq!(s["screen"], "complete");
    assert_eq!(s["step"], 5);
    assert_eq!(s["paymentStatus"], "confirmed");
    assert!(s.get("payment").is_none());
    assert!(!s.to_string().contains("cardNumber"));

    let commitment = s["credential"]["commitment"].as_str().unwrap().to_string();
    assert!(commitment.starts_with("0x") && commitment.len() == 66);
    assert!(s["credential"]["txHash"].is_null());

    let qr: serde_json::Value = serde_json::from_str(s["credential"]["qrPayload"].as_str().unwrap()).unwrap();
    assert_eq!(qr["type"], "zkp-visa");
    assert_eq!(qr["commitment"], commitment.as_str());

    let (status, issuance) = app.call(Method::GET, &format!("/api/v1/issuances/{commitment}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issuance["issuerMode"], "local");
    assert_eq!(issuance["sessionId"], id.as_str());
    assert_eq!(issuance["expired"], false);
}

#[tokio::test]
async fn credential_package_can_be_downloaded() {
    let app = local_app().await;
    let id = app.session_at_payment().await;

    let (status, _) = app.call(Method::GET, &format!("/api/v1/sessions/{id}/credential"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.call(Method::POST, &format!("/api/v1/sessions/{id}/payment"), Some(card())).await;

    let (status, cred) = app.call(Method::GET, &format!("/api/v1/sessions/{id}/credential"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cred["passportNumber"], "E1234567");
    assert_eq!(cred["durationMinutes"], 60);
    assert!(cred["folder"].as_str().unwrap().starts_with("zkp-visa-E1234567-"));
    assert!(cred["wasmB64"].as_str().unwrap().starts_with("AGFzbQ"));
    assert_eq!(cred["files"].as_array().unwrap().len(), 4);

    let commitment = cred["commitment"].as_str().unwrap();
    let (status, bytes, content_type) = app
        .raw(Method::GET, &format!("/api/v1/sessions/{id}/credential/files/commitment.txt"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain"));
    assert_eq!(bytes, commitment.as_bytes());

    let (_, wasm, content_type) = app
        .raw(Method::GET, &format!("/api/v1/sessions/{id}/credential/files/passport_member.wasm"), None, None)
        .await;
    assert_eq!(content_type.as_deref(), Some("application/wasm"));
    assert_eq!(&wasm[..4], b"\0asm");

    let (_, metadata, _) = app
        .raw(Method::GET, &format!("/api/v1/sessions/{id}/credential/files/credential_metadata.json"), None, None)
        .await;
    let metadata: serde_json::Value = serde_json::from_slice(&metadata).unwrap();
    assert_eq!(metadata["merkleLeaf"], commitment);

    let (status, _) = app
        .call(Method::GET, &format!("/api/v1/sessions/{id}/credential/files/private.key"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forward_navigation_is_blocked_until_data_is_complete() {
    let app = local_app().await;
    let (_, s) = app.call(Method::POST, "/api/v1/sessions", None).await;
    let id = s["sessionId"].as_str().unwrap().to_string();

    let (status, _) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/info"), Some(user_data())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.call(Method::POST, &format!("/api/v1/sessions/{id}/start"), None).await;

    let mut incomplete = user_data();
    incomplete["nickname"] = json!("  ");
    let (status, err) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/info"), Some(incomplete)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "nickname is required");

    app.call(Method::POST, &format!("/api/v1/sessions/{id}/info"), Some(user_data())).await;

    let (status, err) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/continue"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "missing documents: id, selfie");

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/v1/sessions/{id}/documents/utility_bill"),
            Some(json!({"name": "bill.pdf", "type": "application/pdf", "size": 10})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/sample"), None).await;
    let (status, err) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/continue"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "documents have not been verified");

    let (_, s) = app.call(Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(s["screen"], "uploadDocuments");
}

#[tokio::test]
async fn failed_verification_can_be_retried() {
    let failing = Simulation {
        verification_success_rate: 0.0,
        ..Simulation::instant()
    };
    let app = app_with(|_| Issuer::Local, Arc::new(LocalRegistry::owned_by(owner())), failing).await;

    let (_, s) = app.call(Method::POST, "/api/v1/sessions", None).await;
    let id = s["sessionId"].as_str().unwrap().to_string();
    app.call(Method::POST, &format!("/api/v1/sessions/{id}/start"), None).await;
    app.call(Method::POST, &format!("/api/v1/sessions/{id}/info"), Some(user_data())).await;
    app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/sample"), None).await;

    for _ in 0..3 {
        let (status, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/verify"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(s["verificationStatus"], "failed");
    }
    let (status, _) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/documents/continue"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn incomplete_card_is_rejected() {
    let app = local_app().await;
    let id = app.session_at_payment().await;

    let mut bad = card();
    bad["cvv"] = json!("");
    let (status, err) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/payment"), Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "cvv is required");

    let (_, s) = app.call(Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(s["paymentStatus"], "pending");
    assert_eq!(s["screen"], "payment");
}

#[tokio::test]
async fn back_and_restart() {
    let app = local_app().await;
    let id = app.session_at_payment().await;

    let (_, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/back"), None).await;
    assert_eq!(s["screen"], "uploadDocuments");
    assert_eq!(s["verificationStatus"], "success");
    let (_, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/back"), None).await;
    assert_eq!(s["screen"], "fillInfo");
    assert_eq!(s["userData"]["passportNumber"], "E1234567");

    let (_, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/restart"), None).await;
    assert_eq!(s["screen"], "home");
    assert!(s["userData"].is_null());
    assert_eq!(s["documents"], json!([]));
    assert_eq!(s["verificationStatus"], "pending");
    assert_eq!(s["paymentStatus"], "pending");
    assert!(s["credential"].is_null());

    let (status, _) = app.call(Method::DELETE, &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_info_lists_order_and_sample_card() {
    let app = local_app().await;
    let (status, info) = app.call(Method::GET, "/api/v1/payment", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["orderSummary"]["totalAed"], 2000);
    assert_eq!(info["orderSummary"]["lines"].as_array().unwrap().len(), 2);
    assert_eq!(info["sampleCard"]["cardNumber"], "4111 1111 1111 1111");
}

#[tokio::test]
async fn issuance_lookup_validates_commitment() {
    let app = local_app().await;
    let (status, _) = app.call(Method::GET, "/api/v1/issuances/0x1234", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = format!("0x{}", "ab".repeat(32));
    let (status, _) = app.call(Method::GET, &format!("/api/v1/issuances/{unknown}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contract_issuer_records_commitment_on_registry() {
    let app = app_with(
        Issuer::Contract,
        Arc::new(LocalRegistry::owned_by(owner())),
        Simulation::instant(),
    )
    .await;
    let id = app.session_at_payment().await;

    let (status, s) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/payment"), Some(card())).await;
    assert_eq!(status, StatusCode::OK, "{s}");
    let commitment = s["credential"]["commitment"].as_str().unwrap().to_string();
    let tx = s["credential"]["txHash"].as_str().unwrap();
    assert_eq!(tx.len(), 66);

    let (status, info) = app.admin(Method::GET, "/api/v1/registry", None).await;
    assert_eq!(status, StatusCode::OK);
    // Single leaf: the root is the commitment itself.
    assert_eq!(info["merkleRoot"], commitment.as_str());
    assert_eq!(info["issuerMode"], "contract");
    assert_eq!(info["isOwner"], true);
    assert_eq!(info["ledgerIssuances"], 1);

    let (_, issuance) = app.call(Method::GET, &format!("/api/v1/issuances/{commitment}"), None).await;
    assert_eq!(issuance["txHash"], tx);
}

#[tokio::test]
async fn contract_issuer_reverts_fail_the_payment() {
    // Signer is not the owner, so the registry refuses to issue.
    let registry = Arc::new(LocalRegistry::new(owner(), Address::repeat_byte(0xbb)));
    let app = app_with(Issuer::Contract, registry, Simulation::instant()).await;
    let id = app.session_at_payment().await;

    let (status, err) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/payment"), Some(card())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "Only the contract owner can issue credentials");

    let (_, s) = app.call(Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(s["screen"], "payment");
    assert_eq!(s["paymentStatus"], "failed");
    assert_eq!(s["paymentError"], "Only the contract owner can issue credentials");
}

#[tokio::test]
async fn admin_routes_require_api_key() {
    let app = local_app().await;
    let (status, err) = app.call(Method::GET, "/api/v1/verifiers", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "missing or invalid api key");

    let (status, _) = app
        .call_with_key(Method::GET, "/api/v1/registry", None, Some("wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verifier_admin_flow() {
    let app = local_app().await;
    let address = "0x52908400098527886E0F7030069857D2E4169EE7";

    let (status, list) = app.admin(Method::GET, "/api/v1/verifiers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 0);

    let (status, added) = app
        .admin(Method::POST, "/api/v1/verifiers", Some(json!({"address": address, "nickname": "Airport"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(added["verifiers"].as_array().unwrap().len(), 1);
    assert_eq!(
        added["verifiers"][0]["address"].as_str().unwrap().to_lowercase(),
        address.to_lowercase()
    );
    assert_eq!(added["verifiers"][0]["authorized"], true);

    let (status, err) = app
        .admin(Method::POST, "/api/v1/verifiers", Some(json!({"address": address.to_lowercase(), "nickname": "Again"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "This verifier address is already registered");

    let (status, err) = app
        .admin(Method::POST, "/api/v1/verifiers", Some(json!({"address": format!("0x{}", "0".repeat(40)), "nickname": "Zero"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "Invalid address: cannot be zero address");

    let (status, _) = app
        .admin(Method::POST, "/api/v1/verifiers", Some(json!({"address": "0x123", "nickname": "Bad"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, revoked) = app.admin(Method::DELETE, &format!("/api/v1/verifiers/{address}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revoked["verifiers"][0]["authorized"], false);

    let (status, err) = app.admin(Method::DELETE, &format!("/api/v1/verifiers/{address}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "Verifier not found or already revoked");

    let (_, info) = app.admin(Method::GET, "/api/v1/registry", None).await;
    assert_eq!(info["verifierCount"], 1);
}

#[tokio::test]
async fn non_owner_cannot_manage_verifiers() {
    let registry = Arc::new(LocalRegistry::new(owner(), Address::repeat_byte(0xbb)));
    let app = app_with(|_| Issuer::Local, registry, Simulation::instant()).await;

    let (status, err) = app.admin(Method::GET, "/api/v1/verifiers", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], NOT_AUTHORIZED);

    let (status, _) = app
        .admin(
            Method::POST,
            "/api/v1/verifiers",
            Some(json!({"address": "0x52908400098527886E0F7030069857D2E4169EE7", "nickname": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, info) = app.admin(Method::GET, "/api/v1/registry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["isOwner"], false);
    assert_eq!(app.registry.get_verifier_count().await.unwrap(), 0);
}

fn slow(verification_ms: u64, payment_ms: u64) -> Simulation {
    Simulation {
        verification_delay: Duration::from_millis(verification_ms),
        payment_delay: Duration::from_millis(payment_ms),
        ..Simulation::instant()
    }
}

async fn slow_app(simulation: Simulation) -> Arc<TestApp> {
    Arc::new(app_with(|_| Issuer::Local, Arc::new(LocalRegistry::owned_by(owner())), simulation).await)
}

#[tokio::test]
async fn verification_resumed_after_restart_conflicts() {
    let app = slow_app(slow(400, 0)).await;
    let id = app.new_session().await;
    app.fill_to_documents(&id).await;

    let verify = format!("/api/v1/sessions/{id}/documents/verify");
    let first = spawn_call(&app, Method::POST, verify.clone(), None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    app.post_all(&id, &[("restart", None)]).await;
    app.fill_to_documents(&id).await;
    let second = spawn_call(&app, Method::POST, verify, None);

    let (status, err) = first.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT, "{err}");
    assert_eq!(err["error"], "the session changed while this step was running");

    let (status, s) = second.await.unwrap();
    assert_eq!(status, StatusCode::OK, "{s}");
    assert_eq!(s["verificationStatus"], "success");

    app.post_all(&id, &[("documents/continue", None)]).await;
}

#[tokio::test]
async fn verification_resumed_after_back_conflicts() {
    let app = slow_app(slow(300, 0)).await;
    let id = app.new_session().await;
    app.fill_to_documents(&id).await;

    let first = spawn_call(&app, Method::POST, format!("/api/v1/sessions/{id}/documents/verify"), None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    app.post_all(&id, &[("back", None), ("info", Some(user_data()))]).await;

    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, s) = app.call(Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(s["screen"], "uploadDocuments");
    assert_eq!(s["verificationStatus"], "pending");
}

#[tokio::test]
async fn payment_resumed_after_restart_conflicts() {
    let app = slow_app(slow(0, 400)).await;
    let id = app.session_at_payment().await;

    let pay = format!("/api/v1/sessions/{id}/payment");
    let first = spawn_call(&app, Method::POST, pay.clone(), Some(card()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Back is refused while the payment is processing; restart is not.
    let (status, _) = app.call(Method::POST, &format!("/api/v1/sessions/{id}/back"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    app.post_all(&id, &[("restart", None)]).await;
    app.fill_to_documents(&id).await;
    app.post_all(&id, &[("documents/verify", None), ("documents/continue", None)]).await;
    let second = spawn_call(&app, Method::POST, pay, Some(card()));

    let (status, err) = first.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT, "{err}");

    let (status, s) = second.await.unwrap();
    assert_eq!(status, StatusCode::OK, "{s}");
    assert_eq!(s["screen"], "complete");
    assert_eq!(s["paymentStatus"], "confirmed");

    // Only the payment that survived issued a credential.
    let (_, info) = app.admin(Method::GET, "/api/v1/registry", None).await;
    assert_eq!(info["ledgerIssuances"], 1);
}
