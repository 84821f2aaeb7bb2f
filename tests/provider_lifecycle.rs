//! End-to-end tests: the provider configured against a mock BIG-IP and
//! driven through the same call sequence the engine uses.

use bigip_provider::testing::{
    assert_plan_changes_attribute, assert_plan_creates, assert_plan_no_changes, ProviderTester,
};
use bigip_provider::{BigIpProvider, ProviderError};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEBTOP_PATH: &str = "/mgmt/tm/apm/resource/webtop/~Common~portal";
const RESOLVER_PATH: &str = "/mgmt/tm/net/dns-resolver/~Common~corp_resolver";
// admin:secret
const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

async fn configured(server: &MockServer) -> ProviderTester<BigIpProvider> {
    let tester = ProviderTester::new(BigIpProvider::new());
    assert_ok!(
        tester
            .configure(json!({
                "address": server.uri(),
                "username": "admin",
                "password": "secret",
                "token_auth": false
            }))
            .await
    );
    tester
}

fn device_webtop(description: &str) -> Value {
    json!({
        "kind": "tm:apm:resource:webtop:webtopstate",
        "name": "portal",
        "partition": "Common",
        "fullPath": "/Common/portal",
        "generation": 41,
        "selfLink": "https://localhost/mgmt/tm/apm/resource/webtop/~Common~portal?ver=16.1.3",
        "customizationGroup": "/Common/portal_cg",
        "customizationGroupReference": {
            "link": "https://localhost/mgmt/tm/apm/resource/customization-group/~Common~portal_cg?ver=16.1.3"
        },
        "customizationType": "Modern",
        "description": description,
        "initialState": "Collapsed",
        "linkType": "uri",
        "locationSpecific": "true",
        "minimizeToTray": "true",
        "resourceSearch": "false",
        "showSearch": "false",
        "urlEntryField": "true",
        "warningOnClose": "true",
        "webtopType": "portal-access"
    })
}

fn device_resolver() -> Value {
    json!({
        "kind": "tm:net:dns-resolver:dns-resolverstate",
        "name": "corp_resolver",
        "partition": "Common",
        "fullPath": "/Common/corp_resolver",
        "answerDefaultZones": "no",
        "cacheSize": 5767168,
        "randomizeQueryNameCase": "yes",
        "routeDomain": "/Common/0",
        "useIpv4": "yes",
        "useIpv6": "yes",
        "useTcp": "yes",
        "useUdp": "yes",
        "forwardZones": [
            {
                "name": "corp.example.com",
                "nameservers": [{"name": "10.10.0.53:53"}, {"name": "10.10.1.53:53"}]
            }
        ]
    })
}

#[tokio::test]
async fn webtop_lifecycle_uses_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mgmt/tm/apm/resource/webtop"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_partial_json(json!({
            "name": "/Common/portal",
            "customizationGroup": "/Common/portal_cg",
            "webtopType": "portal-access",
            "showSearch": "false"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_webtop("")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(WEBTOP_PATH))
        .and(header("authorization", BASIC_AUTH))
        .and(body_partial_json(json!({"description": "partner portal"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WEBTOP_PATH))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_webtop("partner portal")))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(WEBTOP_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let config = json!({
        "name": "/Common/portal",
        "customization_group": "/Common/portal_cg",
        "type": "portal-access"
    });
    assert_ok!(tester.validate_resource_config("bigip_apm_webtop", config.clone()).await);

    let plan = assert_ok!(tester.plan_create("bigip_apm_webtop", config.clone()).await);
    assert_plan_creates(&plan);
    assert_eq!(plan.planned_state["show_search"], false);

    let mut updated_config = config;
    updated_config["description"] = json!("partner portal");
    let state = assert_ok!(
        tester
            .lifecycle_crud(
                "bigip_apm_webtop",
                json!({
                    "name": "/Common/portal",
                    "customization_group": "/Common/portal_cg",
                    "type": "portal-access"
                }),
                updated_config,
            )
            .await
    );

    assert_eq!(state["id"], "/Common/portal");
    assert_eq!(state["description"], "partner portal");
    assert_eq!(state["generation"], 41);
    assert_eq!(state["location_specific"], true);
}

#[tokio::test]
async fn dns_resolver_forward_zones() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mgmt/tm/net/dns-resolver"))
        .and(body_partial_json(json!({
            "name": "/Common/corp_resolver",
            "forwardZones": [{
                "name": "corp.example.com",
                "nameservers": [{"name": "10.10.0.53:53"}, {"name": "10.10.1.53:53"}]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_resolver()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RESOLVER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_resolver()))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = assert_ok!(
        tester
            .lifecycle_create(
                "bigip_net_dns_resolver",
                json!({
                    "name": "/Common/corp_resolver",
                    "route_domain": "/Common/0",
                    "forward_zones": [{
                        "name": "corp.example.com",
                        "nameservers": ["10.10.0.53:53", "10.10.1.53:53"]
                    }]
                }),
            )
            .await
    );

    assert_eq!(state["id"], "/Common/corp_resolver");
    assert_eq!(state["cache_size"], 5767168);
    assert_eq!(
        state["forward_zones"],
        json!([{"name": "corp.example.com", "nameservers": ["10.10.0.53:53", "10.10.1.53:53"]}])
    );

    // Dropping forward_zones from configuration keeps the device's zones.
    let plan = assert_ok!(
        tester
            .plan_update(
                "bigip_net_dns_resolver",
                state.clone(),
                json!({"name": "/Common/corp_resolver", "route_domain": "/Common/0"}),
            )
            .await
    );
    assert_plan_no_changes(&plan);
    assert_eq!(plan.planned_state["forward_zones"], state["forward_zones"]);

    let plan = assert_ok!(
        tester
            .plan_update(
                "bigip_net_dns_resolver",
                state,
                json!({"name": "/Common/corp_resolver", "cache_size": 1024}),
            )
            .await
    );
    assert_plan_changes_attribute(&plan, "cache_size");
    assert!(!plan.requires_replace);
}

#[tokio::test]
async fn resolver_deleted_out_of_band() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RESOLVER_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404,
            "message": "01020036:3: The requested DNS Resolver (/Common/corp_resolver) was not found.",
            "errorStack": [],
            "apiError": 3
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(RESOLVER_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404,
            "message": "01020036:3: The requested DNS Resolver (/Common/corp_resolver) was not found."
        })))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = json!({"id": "/Common/corp_resolver", "name": "/Common/corp_resolver"});

    let refreshed = assert_ok!(tester.read("bigip_net_dns_resolver", state.clone()).await);
    assert!(refreshed.is_none());
    assert_ok!(tester.lifecycle_delete("bigip_net_dns_resolver", state).await);
}

#[tokio::test]
async fn webtop_data_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEBTOP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_webtop("employee portal")))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = assert_ok!(
        tester
            .read_data_source("bigip_apm_webtop", json!({"name": "/Common/portal"}))
            .await
    );
    assert_eq!(state["full_path"], "/Common/portal");
    assert_eq!(state["description"], "employee portal");
    assert_eq!(state["webtop_type"], "portal-access");
    assert_eq!(state["warn_when_closed"], true);

    let err = assert_err!(
        tester
            .read_data_source("bigip_apm_webtop", json!({"name": "/Common/other"}))
            .await
    );
    assert!(matches!(err, ProviderError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn api_errors_carry_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mgmt/tm/ilx/workspace"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": 409,
            "message": "01020066:3: The requested workspace (/Common/ws1) already exists in partition Common."
        })))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let err = assert_err!(
        tester
            .create("bigip_ilx_workspace", json!({"name": "ws1"}))
            .await
    );
    assert!(matches!(err, ProviderError::AlreadyExists(_)), "got {err:?}");
    assert!(err.message().starts_with("error creating workspace ws1: "));
}

#[tokio::test]
async fn operations_require_configuration() {
    let tester = ProviderTester::new(BigIpProvider::new());
    let err = assert_err!(
        tester
            .read("bigip_apm_webtop", json!({"name": "/Common/portal"}))
            .await
    );
    assert!(matches!(err, ProviderError::Configuration(_)));
}
