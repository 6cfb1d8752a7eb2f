//! Pipeline and planner integration tests
//!
//! Plans run against a [`ScriptedRunner`], so every command is recorded and
//! nothing touches the host.

use hostnet_exec::{
    ignore_tags, CommandPipeline, CommandSpec, ConfigurationPlan, Credential, ExitState, PlanStep,
};
use hostnet_netcfg::{
    AddressingMode, ConfigurationPlanner, InterfaceRequest, NetcfgConfig, NetcfgError,
    PowerAction, RouteOutcome, WifiSettings,
};
use hostnet_test::{ip, ScriptedRunner};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const LIST_CONNECTIONS: &str = "nmcli -f NAME,DEVICE -t connection show";

fn cmd(name: &str) -> CommandSpec {
    CommandSpec::new("step", [name]).with_tag(name)
}

fn wifi(password: &str, confirm: &str) -> WifiSettings {
    WifiSettings {
        ssid: "office".into(),
        ssid_manual: String::new(),
        password: password.into(),
        password_confirm: confirm.into(),
    }
}

/// Two connections: eth0 on 192.168.1.0/24 with a multicast route, wlan0 on 10.0.0.0/24
fn routed_host() -> ScriptedRunner {
    ScriptedRunner::new()
        .answer(LIST_CONNECTIONS, "hostnet_conn_eth0:eth0\nhostnet_conn_wlan0:wlan0\n")
        .answer(
            "nmcli -f IP4.ADDRESS connection show hostnet_conn_eth0",
            "IP4.ADDRESS[1]:                         192.168.1.5/24\n",
        )
        .answer(
            "nmcli -f IP4.ADDRESS connection show hostnet_conn_wlan0",
            "IP4.ADDRESS[1]:                         10.0.0.7/24\n",
        )
        .answer(
            "nmcli -f IP4.ROUTE connection show hostnet_conn_eth0",
            "IP4.ROUTE[1]:                           dst = 224.0.23.0/32, nh = 192.168.1.1, mt = 100\n",
        )
}

#[tokio::test]
async fn test_pipeline_aborts_on_first_fatal_failure() {
    let runner = Arc::new(ScriptedRunner::new().fail_with("step B", 3, "B exploded"));
    let pipeline = CommandPipeline::new(runner.clone());
    let plan: ConfigurationPlan = [cmd("A"), cmd("B"), cmd("C")]
        .into_iter()
        .map(PlanStep::from)
        .collect();

    let err = pipeline.run(&plan, None, None).await.unwrap_err();

    assert_eq!(runner.lines(), vec!["step A", "step B"]);
    assert_eq!(err.step_index, 1);
    assert_eq!(err.step, cmd("B"));
    assert_eq!(err.source.exit_state(), Some(ExitState::Code(3)));
    assert_eq!(err.source.stderr(), Some("B exploded"));
}

#[tokio::test]
async fn test_pipeline_ignore_predicate_suppresses_teardown_failures() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .fail_matching("step down")
            .fail_matching("step delete"),
    );
    let pipeline = CommandPipeline::new(runner.clone());
    let plan = ConfigurationPlan::new()
        .then(cmd("down"))
        .then(cmd("delete"))
        .then(cmd("create"));
    let tolerated = ignore_tags(&["down", "delete"]);

    let outputs = pipeline.run(&plan, Some(&tolerated), None).await.unwrap();

    assert_eq!(outputs.len(), 3);
    assert_eq!(runner.lines(), vec!["step down", "step delete", "step create"]);
}

#[tokio::test]
async fn test_password_mismatch_short_circuits() {
    let runner = Arc::new(ScriptedRunner::new());
    let planner = ConfigurationPlanner::new(runner.clone(), NetcfgConfig::default());
    let mut request = InterfaceRequest::new("wlan0", AddressingMode::Dhcp)
        .with_wifi(wifi("correct horse", "battery staple"))
        .with_power(PowerAction::Reboot);

    let err = planner
        .apply_interface(&mut request, Some(&Credential::new("root")))
        .await
        .unwrap_err();

    assert!(matches!(err, NetcfgError::PasswordMismatch));
    assert!(runner.calls().is_empty());
    assert_eq!(request.power, PowerAction::None);
}

#[tokio::test]
async fn test_wifi_reconfiguration_end_to_end() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .fail_matching("connection down hostnet_conn_wlan0")
            .fail_matching("connection delete hostnet_conn_wlan0"),
    );
    let planner = ConfigurationPlanner::new(runner.clone(), NetcfgConfig::default());
    let mut request = InterfaceRequest::new(
        "wlan0",
        AddressingMode::Static {
            address: "10.0.0.7/24".parse().unwrap(),
            gateway: Some(ip("10.0.0.1")),
        },
    )
    .with_wifi(WifiSettings {
        ssid_manual: "lab".into(),
        ..wifi("s3cret", "s3cret")
    })
    .with_power(PowerAction::Reboot);

    planner
        .apply_interface(&mut request, Some(&Credential::new("root")))
        .await
        .unwrap();

    assert_eq!(
        runner.lines(),
        vec![
            "nmcli connection down hostnet_conn_wlan0",
            "nmcli connection delete hostnet_conn_wlan0",
            "nmcli connection add con-name hostnet_conn_wlan0 type wifi ifname wlan0 ssid lab",
            "nmcli connection modify hostnet_conn_wlan0 ipv4.method manual ipv4.addresses \"10.0.0.7/24 10.0.0.1\"",
            "nmcli connection modify hostnet_conn_wlan0 wifi-sec.key-mgmt wpa-psk wifi-sec.psk ***",
            "nmcli connection up hostnet_conn_wlan0",
            "reboot",
        ]
    );
    assert!(runner.calls().iter().all(|c| c.elevated && c.with_credential));
    let wifi = request.wifi.unwrap();
    assert!(wifi.password.is_empty() && wifi.password_confirm.is_empty());
    assert_eq!(request.power, PowerAction::None);
}

#[tokio::test]
async fn test_failure_reports_step_and_diagnostics() {
    let runner = Arc::new(ScriptedRunner::new().fail_with(
        "connection up",
        4,
        "Error: Connection activation failed: No suitable device found",
    ));
    let planner = ConfigurationPlanner::new(runner, NetcfgConfig::default());
    let mut request = InterfaceRequest::new("eth0", AddressingMode::Dhcp);

    let err = planner.apply_interface(&mut request, None).await.unwrap_err();

    let text = err.to_string();
    assert!(text.contains("Step 4"));
    assert!(text.contains("nmcli connection up hostnet_conn_eth0"));
    assert!(text.contains("No suitable device found"));
}

#[tokio::test]
async fn test_identical_route_issues_no_commands() {
    let runner = Arc::new(routed_host());
    let planner = ConfigurationPlanner::new(runner.clone(), NetcfgConfig::default());

    let plan = planner
        .plan_route("224.0.23.0/32".parse().unwrap(), ip("192.168.1.1"))
        .await
        .unwrap();
    assert!(plan.is_empty());

    let outcome = planner
        .apply_route("224.0.23.0/32".parse().unwrap(), ip("192.168.1.1"), None)
        .await
        .unwrap();

    assert_eq!(outcome, RouteOutcome::Unchanged);
    assert!(runner.elevated_lines().is_empty());
}

#[tokio::test]
async fn test_new_route_is_added_and_connection_cycled() {
    let runner = Arc::new(routed_host());
    let planner = ConfigurationPlanner::new(runner.clone(), NetcfgConfig::default());

    let outcome = planner
        .apply_route("239.255.0.0/16".parse().unwrap(), ip("10.0.0.1"), None)
        .await
        .unwrap();

    assert!(matches!(outcome, RouteOutcome::Applied(ref out) if out.len() == 3));
    assert_eq!(
        runner.elevated_lines(),
        vec![
            "nmcli connection modify hostnet_conn_wlan0 +ipv4.routes \"239.255.0.0/16 10.0.0.1\"",
            "nmcli connection down hostnet_conn_wlan0",
            "nmcli connection up hostnet_conn_wlan0",
        ]
    );
}

#[tokio::test]
async fn test_route_plan_has_no_tolerated_failures() {
    let runner = Arc::new(routed_host().fail_matching("connection down hostnet_conn_eth0"));
    let planner = ConfigurationPlanner::new(runner.clone(), NetcfgConfig::default());

    let err = planner
        .apply_route("224.0.23.0/32".parse().unwrap(), ip("10.0.0.1"), None)
        .await
        .unwrap_err();

    match err {
        NetcfgError::Pipeline(e) => assert_eq!(e.step_index, 1),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(runner.elevated_lines().len(), 2);
}

#[tokio::test]
async fn test_route_without_gateway_connection_fails_before_commands() {
    let runner = Arc::new(routed_host());
    let planner = ConfigurationPlanner::new(runner.clone(), NetcfgConfig::default());

    let err = planner
        .apply_route("10.20.0.0/16".parse().unwrap(), ip("172.16.0.1"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, NetcfgError::NoConnectionForGateway(gw) if gw == ip("172.16.0.1")));
    assert!(runner.elevated_lines().is_empty());
}
