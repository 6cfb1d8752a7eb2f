//! ConfigurationPlanner - turns configuration requests into nmcli plans
//!
//! Planning is pure: it validates the request and produces a
//! [`ConfigurationPlan`] without running anything. The `apply_*` methods
//! plan, then execute the whole plan as one pipeline.

use hostnet_exec::{
    ignore_tags, BarrierHook, CommandPipeline, CommandRunner, ConfigurationPlan, Credential,
    PlanStep,
};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::commands::{
    build_add_ethernet_cmd, build_add_wifi_cmd, build_connection_delete_cmd,
    build_connection_down_cmd, build_connection_up_cmd, build_dhcp_cmd, build_power_cmd,
    build_route_add_cmd, build_route_remove_cmd, build_static_cmd,
    build_static_separate_gateway_cmd, build_wifi_psk_cmd, TAG_DELETE, TAG_DOWN,
};
use crate::config::NetcfgConfig;
use crate::error::{NetcfgError, Result};
use crate::nmcli::NmcliClient;
use crate::types::{AddressingMode, InterfaceRequest, PowerAction, RouteDescriptor, RouteOutcome};

/// Failures tolerated while tearing down a previous connection
const TEARDOWN_TAGS: [&str; 2] = [TAG_DOWN, TAG_DELETE];

#[derive(Clone)]
pub struct ConfigurationPlanner {
    config: NetcfgConfig,
    client: NmcliClient,
    pipeline: CommandPipeline,
}

impl ConfigurationPlanner {
    pub fn new(runner: Arc<dyn CommandRunner>, config: NetcfgConfig) -> Self {
        let client = NmcliClient::new(runner.clone(), config.nmcli_path.clone());
        Self {
            config,
            client,
            pipeline: CommandPipeline::new(runner),
        }
    }

    /// Invoke `hook` when a plan reaches its barrier, before any power action
    pub fn with_barrier_hook(mut self, hook: BarrierHook) -> Self {
        self.pipeline = self.pipeline.with_barrier_hook(hook);
        self
    }

    pub fn client(&self) -> &NmcliClient {
        &self.client
    }

    /// Plan a full reconfiguration of `request.interface`.
    ///
    /// Fails with [`NetcfgError::PasswordMismatch`] before producing any step.
    pub fn plan_interface(
        &self,
        request: &InterfaceRequest,
        power: PowerAction,
    ) -> Result<ConfigurationPlan> {
        if let Some(wifi) = &request.wifi {
            if !wifi.passwords_match() {
                return Err(NetcfgError::PasswordMismatch);
            }
        }

        let nmcli = self.config.nmcli_path.as_str();
        let iface = request.interface.as_str();
        let conn = self.config.connection_name(iface);

        let mut plan = ConfigurationPlan::new()
            .then(build_connection_down_cmd(nmcli, &conn))
            .then(build_connection_delete_cmd(nmcli, &conn));

        plan.push(match &request.wifi {
            Some(wifi) => build_add_wifi_cmd(nmcli, &conn, iface, wifi.effective_ssid()),
            None => build_add_ethernet_cmd(nmcli, &conn, iface),
        });

        plan.push(match request.addressing {
            AddressingMode::Dhcp => PlanStep::Run(build_dhcp_cmd(nmcli, &conn)),
            AddressingMode::Static { address, gateway } => PlanStep::WithFallback {
                primary: build_static_cmd(nmcli, &conn, &address, gateway),
                alternate: build_static_separate_gateway_cmd(nmcli, &conn, &address, gateway),
            },
        });

        if let Some(wifi) = &request.wifi {
            plan.push(build_wifi_psk_cmd(nmcli, &conn, &wifi.password));
        }

        plan.push(build_connection_up_cmd(nmcli, &conn));

        if let Some(cmd) = build_power_cmd(power) {
            plan.push(PlanStep::Barrier);
            plan.push(cmd);
        }

        Ok(plan)
    }

    /// Plan and apply `request`.
    ///
    /// The power action is consumed and the WiFi passwords are cleared
    /// whatever the outcome.
    #[instrument(skip(self, request, credential), fields(interface = %request.interface))]
    pub async fn apply_interface(
        &self,
        request: &mut InterfaceRequest,
        credential: Option<&Credential>,
    ) -> Result<Vec<String>> {
        let power = std::mem::take(&mut request.power);
        let planned = self.plan_interface(request, power);
        if let Some(wifi) = request.wifi.as_mut() {
            wifi.scrub();
        }
        let plan = planned?;

        info!(steps = plan.len(), ?power, "Applying interface configuration");
        let tolerated = ignore_tags(&TEARDOWN_TAGS);
        Ok(self.pipeline.run(&plan, Some(&tolerated), credential).await?)
    }

    /// Plan a static route to `target` through `gateway`.
    ///
    /// Returns an empty plan when the identical route already exists.
    pub async fn plan_route(
        &self,
        target: Ipv4Network,
        gateway: Ipv4Addr,
    ) -> Result<ConfigurationPlan> {
        let existing = self.client.find_route(&target).await?;
        let connection_name = self
            .client
            .find_connection_for_gateway(gateway)
            .await?
            .ok_or(NetcfgError::NoConnectionForGateway(gateway))?;
        let requested = RouteDescriptor {
            connection_name,
            target,
            gateway,
        };

        let nmcli = self.config.nmcli_path.as_str();
        let mut plan = ConfigurationPlan::new();

        if let Some(previous) = existing {
            if previous == requested {
                return Ok(plan);
            }
            plan.push(build_route_remove_cmd(nmcli, &previous));
            plan.push(build_connection_down_cmd(nmcli, &previous.connection_name));
            plan.push(build_connection_up_cmd(nmcli, &previous.connection_name));
        }

        plan.push(build_route_add_cmd(nmcli, &requested));
        plan.push(build_connection_down_cmd(nmcli, &requested.connection_name));
        plan.push(build_connection_up_cmd(nmcli, &requested.connection_name));
        Ok(plan)
    }

    /// Plan and apply a static route; no failure is tolerated
    #[instrument(skip(self, credential))]
    pub async fn apply_route(
        &self,
        target: Ipv4Network,
        gateway: Ipv4Addr,
        credential: Option<&Credential>,
    ) -> Result<RouteOutcome> {
        let plan = self.plan_route(target, gateway).await?;
        if plan.is_empty() {
            info!(%target, %gateway, "Route already configured");
            return Ok(RouteOutcome::Unchanged);
        }
        let outputs = self.pipeline.run(&plan, None, credential).await?;
        Ok(RouteOutcome::Applied(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WifiSettings;
    use async_trait::async_trait;
    use hostnet_exec::{CommandSpec, ExecError, ExecResult, ExitState};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every command; fails those whose line contains a listed needle
    #[derive(Default)]
    struct RecordingRunner {
        failing: Vec<String>,
        answers: Vec<(String, String)>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingRunner {
        fn failing(needles: &[&str]) -> Self {
            Self {
                failing: needles.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn answering(answers: &[(&str, &str)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, cmd: &CommandSpec, _: Option<&Credential>) -> ExecResult<String> {
            let line = cmd.command_line();
            self.calls.lock().unwrap().push(line.clone());
            if self.failing.iter().any(|n| line.contains(n.as_str())) {
                return Err(ExecError::CommandFailed {
                    command: line,
                    status: ExitState::Code(2),
                    stderr: "Error: invalid property".into(),
                });
            }
            Ok(self
                .answers
                .iter()
                .find(|(k, _)| *k == line)
                .map(|(_, v)| v.clone())
                .unwrap_or_default())
        }
    }

    fn planner(runner: Arc<RecordingRunner>) -> ConfigurationPlanner {
        ConfigurationPlanner::new(runner, NetcfgConfig::default())
    }

    fn wifi(password: &str, confirm: &str) -> WifiSettings {
        WifiSettings {
            ssid: "office".into(),
            ssid_manual: String::new(),
            password: password.into(),
            password_confirm: confirm.into(),
        }
    }

    fn static_eth0() -> InterfaceRequest {
        InterfaceRequest::new(
            "eth0",
            AddressingMode::Static {
                address: "192.168.1.5/24".parse().unwrap(),
                gateway: Some(Ipv4Addr::new(192, 168, 1, 1)),
            },
        )
    }

    #[test]
    fn test_plan_ethernet_dhcp() {
        let p = planner(Arc::new(RecordingRunner::default()));
        let plan = p
            .plan_interface(&InterfaceRequest::new("eth0", AddressingMode::Dhcp), PowerAction::None)
            .unwrap();
        let lines: Vec<String> = plan.commands().map(|c| c.command_line()).collect();
        assert_eq!(
            lines,
            vec![
                "nmcli connection down hostnet_conn_eth0",
                "nmcli connection delete hostnet_conn_eth0",
                "nmcli connection add con-name hostnet_conn_eth0 type ethernet ifname eth0",
                "nmcli connection modify hostnet_conn_eth0 ipv4.method auto",
                "nmcli connection up hostnet_conn_eth0",
            ]
        );
        assert!(plan.commands().all(|c| c.requires_elevation()));
    }

    #[test]
    fn test_plan_wifi_static_with_power() {
        let p = planner(Arc::new(RecordingRunner::default()));
        let mut request = static_eth0().with_wifi(wifi("pw", "pw"));
        request.interface = "wlan0".into();
        let plan = p.plan_interface(&request, PowerAction::Reboot).unwrap();

        let steps = plan.steps();
        assert_eq!(steps.len(), 8);
        assert!(matches!(steps[3], PlanStep::WithFallback { .. }));
        assert_eq!(steps[4].command().unwrap().args()[6], "pw");
        assert_eq!(steps[6], PlanStep::Barrier);
        assert_eq!(steps[7].command().unwrap().argv(), ["reboot"]);
        assert!(steps[2].command().unwrap().command_line().contains("type wifi ifname wlan0 ssid office"));
    }

    #[tokio::test]
    async fn test_password_mismatch_issues_no_commands() {
        let runner = Arc::new(RecordingRunner::default());
        let p = planner(runner.clone());
        let mut request = InterfaceRequest::new("wlan0", AddressingMode::Dhcp)
            .with_wifi(wifi("one", "two"))
            .with_power(PowerAction::Shutdown);

        let err = p.apply_interface(&mut request, None).await.unwrap_err();

        assert!(matches!(err, NetcfgError::PasswordMismatch));
        assert!(runner.calls().is_empty());
        assert_eq!(request.power, PowerAction::None);
        assert!(request.wifi.as_ref().unwrap().password.is_empty());
    }

    #[tokio::test]
    async fn test_first_time_setup_tolerates_teardown_failures() {
        let runner = Arc::new(RecordingRunner::failing(&["connection down", "connection delete"]));
        let p = planner(runner.clone());
        let mut request = InterfaceRequest::new("eth0", AddressingMode::Dhcp);

        let outputs = p.apply_interface(&mut request, None).await.unwrap();

        assert_eq!(outputs.len(), 5);
        assert_eq!(runner.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_static_falls_back_to_separate_gateway() {
        let runner = Arc::new(RecordingRunner::failing(&["192.168.1.5/24 192.168.1.1"]));
        let p = planner(runner.clone());
        let mut request = static_eth0();

        p.apply_interface(&mut request, None).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 6);
        assert!(calls[4].ends_with("ipv4.gateway 192.168.1.1"));
    }

    #[tokio::test]
    async fn test_dhcp_failure_propagates_without_retry() {
        let runner = Arc::new(RecordingRunner::failing(&["ipv4.method auto"]));
        let p = planner(runner.clone());
        let mut request = InterfaceRequest::new("eth0", AddressingMode::Dhcp)
            .with_power(PowerAction::Reboot);

        let err = p.apply_interface(&mut request, None).await.unwrap_err();

        match err {
            NetcfgError::Pipeline(e) => assert_eq!(e.step_index, 3),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(runner.calls().len(), 4);
        assert_eq!(request.power, PowerAction::None);
    }

    #[tokio::test]
    async fn test_barrier_hook_runs_before_power_action() {
        let runner = Arc::new(RecordingRunner::default());
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let (r, s) = (runner.clone(), seen.clone());
        let p = planner(runner.clone()).with_barrier_hook(Arc::new(move || {
            s.store(r.calls().len(), Ordering::SeqCst);
        }));
        let mut request =
            InterfaceRequest::new("eth0", AddressingMode::Dhcp).with_power(PowerAction::Shutdown);

        let outputs = p.apply_interface(&mut request, None).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(outputs.len(), 7);
        assert_eq!(runner.calls().last().unwrap(), "shutdown -h now");
    }

    const CONNECTIONS: (&str, &str) = (
        "nmcli -f NAME,DEVICE -t connection show",
        "hostnet_conn_eth0:eth0\nhostnet_conn_wlan0:wlan0\n",
    );
    const ADDR_ETH0: (&str, &str) = (
        "nmcli -f IP4.ADDRESS connection show hostnet_conn_eth0",
        "IP4.ADDRESS[1]:  192.168.1.5/24\n",
    );
    const ADDR_WLAN0: (&str, &str) = (
        "nmcli -f IP4.ADDRESS connection show hostnet_conn_wlan0",
        "IP4.ADDRESS[1]:  10.0.0.7/24\n",
    );

    #[tokio::test]
    async fn test_identical_route_is_a_no_op() {
        let runner = Arc::new(RecordingRunner::answering(&[
            CONNECTIONS,
            ADDR_ETH0,
            ADDR_WLAN0,
            (
                "nmcli -f IP4.ROUTE connection show hostnet_conn_eth0",
                "IP4.ROUTE[1]:  dst = 224.0.23.0/32, nh = 192.168.1.1, mt = 100\n",
            ),
        ]));
        let p = planner(runner.clone());

        let outcome = p
            .apply_route("224.0.23.0/32".parse().unwrap(), Ipv4Addr::new(192, 168, 1, 1), None)
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::Unchanged);
        assert!(runner.calls().iter().all(|c| !c.contains("ipv4.routes")));
    }

    #[tokio::test]
    async fn test_moved_route_removes_previous_first() {
        let runner = Arc::new(RecordingRunner::answering(&[
            CONNECTIONS,
            ADDR_ETH0,
            ADDR_WLAN0,
            (
                "nmcli -f IP4.ROUTE connection show hostnet_conn_eth0",
                "IP4.ROUTE[1]:  dst = 224.0.23.0/32, nh = 192.168.1.1, mt = 100\n",
            ),
        ]));
        let p = planner(runner);

        let plan = p
            .plan_route("224.0.23.0/32".parse().unwrap(), Ipv4Addr::new(10, 0, 0, 1))
            .await
            .unwrap();
        let lines: Vec<String> = plan.commands().map(|c| c.command_line()).collect();

        assert_eq!(
            lines,
            vec![
                "nmcli connection modify hostnet_conn_eth0 -ipv4.routes \"224.0.23.0/32 192.168.1.1\"",
                "nmcli connection down hostnet_conn_eth0",
                "nmcli connection up hostnet_conn_eth0",
                "nmcli connection modify hostnet_conn_wlan0 +ipv4.routes \"224.0.23.0/32 10.0.0.1\"",
                "nmcli connection down hostnet_conn_wlan0",
                "nmcli connection up hostnet_conn_wlan0",
            ]
        );
    }

    #[tokio::test]
    async fn test_route_without_matching_connection_issues_nothing() {
        let runner = Arc::new(RecordingRunner::answering(&[CONNECTIONS, ADDR_ETH0, ADDR_WLAN0]));
        let p = planner(runner.clone());

        let err = p
            .apply_route("10.9.0.0/16".parse().unwrap(), Ipv4Addr::new(172, 16, 0, 1), None)
            .await
            .unwrap_err();

        assert!(matches!(err, NetcfgError::NoConnectionForGateway(_)));
        assert!(runner.calls().iter().all(|c| !c.contains("modify")));
    }
}
