//! ipmitool subprocess transport.
//! Every command is prefixed with the lanplus authentication arguments of the
//! target BMC. The password never reaches the log output.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ipmi::IpmiError;

/// How long a single ipmitool invocation may take before it is abandoned.
/// Some BMCs wedge indefinitely on a dropped lanplus session.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection parameters for a remote BMC, as stored per machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpmiConnection {
    pub host: String,
    pub user: String,
    pub password: String,
}

/// Executes one ipmitool command against a BMC and returns its stdout.
/// The production implementation spawns the locally installed CLI; tests
/// substitute a scripted fake.
#[async_trait]
pub trait IpmiTransport: Send + Sync {
    async fn execute(&self, args: &[&str]) -> Result<String, IpmiError>;
}

#[async_trait]
impl<T: IpmiTransport> IpmiTransport for std::sync::Arc<T> {
    async fn execute(&self, args: &[&str]) -> Result<String, IpmiError> {
        (**self).execute(args).await
    }
}

/// Builds a transport for a machine's connection descriptor. The scheduler
/// constructs one transport per apply cycle through this seam, so tests can
/// observe and script scheduled fires.
pub trait TransportFactory: Send + Sync + 'static {
    type Transport: IpmiTransport + 'static;

    fn connect(&self, connection: &IpmiConnection) -> Self::Transport;
}

/// Production factory: one ipmitool transport per connection.
pub struct IpmitoolFactory;

impl TransportFactory for IpmitoolFactory {
    type Transport = IpmitoolTransport;

    fn connect(&self, connection: &IpmiConnection) -> IpmitoolTransport {
        IpmitoolTransport::new(connection.clone())
    }
}

/// Transport backed by the `ipmitool` binary over lanplus.
pub struct IpmitoolTransport {
    connection: IpmiConnection,
    timeout: Duration,
}

impl IpmitoolTransport {
    pub fn new(connection: IpmiConnection) -> Self {
        Self {
            connection,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    fn auth_args(&self) -> Vec<&str> {
        vec![
            "-I",
            "lanplus",
            "-H",
            &self.connection.host,
            "-U",
            &self.connection.user,
            "-P",
            &self.connection.password,
        ]
    }
}

#[async_trait]
impl IpmiTransport for IpmitoolTransport {
    async fn execute(&self, args: &[&str]) -> Result<String, IpmiError> {
        let mut full_args = self.auth_args();
        full_args.extend_from_slice(args);

        debug!("executing: ipmitool {}", redact_password(&full_args));

        let mut cmd = tokio::process::Command::new("ipmitool");
        cmd.args(&full_args);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| IpmiError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(IpmiError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Render an argument vector for logging with the `-P` value masked.
fn redact_password(args: &[&str]) -> String {
    let mut rendered = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            rendered.push("****");
            mask_next = false;
        } else {
            rendered.push(arg);
            mask_next = *arg == "-P";
        }
    }
    rendered.join(" ")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::IpmiTransport;
    use crate::ipmi::IpmiError;

    /// Records every argument vector and replays canned stdout per command.
    /// Commands without a scripted response return empty output; a failing
    /// transport records the call and then errors.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: HashMap<String, String>,
        fail_all: bool,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(mut self, command: &str, output: &str) -> Self {
            self.responses
                .insert(command.to_string(), output.to_string());
            self
        }

        pub(crate) fn failing(mut self) -> Self {
            self.fail_all = true;
            self
        }

        pub(crate) fn recorded_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IpmiTransport for ScriptedTransport {
        async fn execute(&self, args: &[&str]) -> Result<String, IpmiError> {
            let command = args.join(" ");
            self.calls.lock().unwrap().push(command.clone());
            if self.fail_all {
                return Err(IpmiError::CommandFailed {
                    status: 1,
                    stderr: "scripted failure".to_string(),
                });
            }
            Ok(self.responses.get(&command).cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_masked_in_log_rendering() {
        let args = vec![
            "-I", "lanplus", "-H", "10.0.0.9", "-U", "root", "-P", "hunter2", "chassis", "status",
        ];
        let rendered = redact_password(&args);
        assert!(!rendered.contains("hunter2"));
        assert_eq!(
            rendered,
            "-I lanplus -H 10.0.0.9 -U root -P **** chassis status"
        );
    }
}
