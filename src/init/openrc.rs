use super::InitManager;
use crate::cmd::{Runner, SystemRunner};
use crate::config::Config;
use crate::pattern::ServicePattern;
use crate::service::InitService;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// OpenRC, driven through `rc-service` and `rc-update`.
pub struct OpenRc<R = SystemRunner> {
    runner: R,
    rc_service: PathBuf,
    rc_update: PathBuf,
    /// Runlevel services are added to and removed from
    runlevel: String,
    runlevels_dir: PathBuf,
}

impl OpenRc {
    pub fn new(config: &Config) -> Self {
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: Runner> OpenRc<R> {
    pub fn with_runner(config: &Config, runner: R) -> Self {
        Self {
            runner,
            rc_service: config.openrc.rc_service.clone(),
            rc_update: config.openrc.rc_update.clone(),
            runlevel: config.openrc.runlevel.clone(),
            runlevels_dir: config.openrc.runlevels_dir.clone(),
        }
    }

    fn rc_service(&self, name: &str, command: &str) -> Result<String> {
        let name = service_name(name);
        self.runner
            .output(&self.rc_service, &["--quiet", name, command])
    }

    fn rc_update(&self, command: &str, name: &str) -> Result<()> {
        let name = service_name(name);
        self.runner
            .output(&self.rc_update, &["--quiet", command, name, self.runlevel.as_str()])?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let out = self.runner.output(&self.rc_service, &["--list"])?;
        Ok(parse_list(&out))
    }
}

impl<R: Runner> InitManager for OpenRc<R> {
    fn name(&self) -> &str {
        "OpenRC"
    }

    fn list_services(&self, pattern: &str) -> Result<Vec<InitService>> {
        let pattern = ServicePattern::parse(pattern)?;

        self.list()?
            .into_iter()
            .filter(|name| pattern.matches(name))
            .map(|name| {
                let running = self.is_service_running(&name)?;
                Ok::<_, Error>(InitService { name, running })
            })
            .collect()
    }

    fn is_service_enabled(&self, name: &str) -> Result<bool> {
        let entry = self
            .runlevels_dir
            .join(&self.runlevel)
            .join(service_name(name));
        Ok(entry_exists(&entry))
    }

    fn is_service_running(&self, name: &str) -> Result<bool> {
        match self.rc_service(name, "status") {
            Ok(_) => Ok(true),
            // rc-service ran and reported the service as not started
            Err(Error::Exit { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn enable_service(&self, name: &str) -> Result<()> {
        self.rc_update("add", name)
    }

    fn disable_service(&self, name: &str) -> Result<()> {
        self.rc_update("del", name)
    }

    fn start_service(&self, name: &str) -> Result<()> {
        self.rc_service(name, "start")?;
        Ok(())
    }

    fn stop_service(&self, name: &str) -> Result<()> {
        self.rc_service(name, "stop")?;
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        // OpenRC reads init scripts on every invocation
        Ok(())
    }
}

/// OpenRC service name for `name`, which may carry a systemd `.service` suffix.
fn service_name(name: &str) -> &str {
    name.strip_suffix(".service").unwrap_or(name)
}

fn parse_list(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Runlevel entries are symlinks into /etc/init.d; a dangling one still counts.
fn entry_exists(path: &Path) -> bool {
    path.exists() || path.is_symlink()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::sync::Mutex;

    type Script = Box<dyn Fn(&[&str]) -> Result<String> + Send + Sync>;

    /// Records every invocation and answers from a script.
    struct FakeRunner {
        calls: Mutex<Vec<String>>,
        script: Script,
    }

    impl FakeRunner {
        fn new(script: impl Fn(&[&str]) -> Result<String> + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                script: Box::new(script),
            }
        }

        fn ok() -> Self {
            Self::new(|_| Ok(String::new()))
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Runner for FakeRunner {
        fn output(&self, program: &Path, args: &[&str]) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", program.display(), args.join(" ")));
            (self.script)(args)
        }
    }

    fn exit(code: i32) -> Error {
        Error::Exit {
            program: "/sbin/rc-service".into(),
            code: Some(code),
            stderr: String::new(),
        }
    }

    fn spawn_failure() -> Error {
        Error::Spawn {
            program: "/sbin/rc-service".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        }
    }

    fn openrc(runner: FakeRunner) -> OpenRc<FakeRunner> {
        OpenRc::with_runner(&Config::default(), runner)
    }

    /// `sshd` and `crond` are started, everything else is stopped.
    fn listing_runner() -> FakeRunner {
        FakeRunner::new(|args| match args {
            ["--list"] => Ok("sshd\ncrond\n\ncronie\nnginx\n".into()),
            ["--quiet", "sshd" | "crond", "status"] => Ok(String::new()),
            ["--quiet", _, "status"] => Err(exit(3)),
            other => panic!("unexpected call {other:?}"),
        })
    }

    #[test]
    fn list_all() {
        let rc = openrc(listing_runner());
        let services = rc.list_services("").unwrap();
        assert_eq!(
            services,
            vec![
                InitService::new("sshd", true),
                InitService::new("crond", true),
                InitService::new("cronie", false),
                InitService::new("nginx", false),
            ]
        );
        assert_eq!(rc.list_services("*").unwrap(), services);
    }

    #[test]
    fn list_filtered_only_checks_matches() {
        let rc = openrc(listing_runner());
        let services = rc.list_services("cron*").unwrap();
        assert_eq!(
            services,
            vec![InitService::new("crond", true), InitService::new("cronie", false)]
        );
        assert_eq!(
            rc.runner.calls(),
            vec![
                "/sbin/rc-service --list",
                "/sbin/rc-service --quiet crond status",
                "/sbin/rc-service --quiet cronie status",
            ]
        );
    }

    #[test]
    fn list_aborts_on_status_launch_failure() {
        let rc = openrc(FakeRunner::new(|args| match args {
            ["--list"] => Ok("sshd\n".into()),
            _ => Err(spawn_failure()),
        }));
        assert!(matches!(rc.list_services(""), Err(Error::Spawn { .. })));
    }

    #[test]
    fn list_rejects_invalid_pattern() {
        let rc = openrc(listing_runner());
        assert!(matches!(rc.list_services("[x"), Err(Error::Pattern(_))));
    }

    #[test]
    fn status_exit_code_is_not_running() {
        let rc = openrc(FakeRunner::new(|_| Err(exit(3))));
        assert!(!rc.is_service_running("cron").unwrap());
        assert_eq!(rc.runner.calls(), vec!["/sbin/rc-service --quiet cron status"]);
    }

    #[test]
    fn status_success_is_running() {
        let rc = openrc(FakeRunner::ok());
        assert!(rc.is_service_running("cron").unwrap());
    }

    #[test]
    fn status_launch_failure_propagates() {
        let rc = openrc(FakeRunner::new(|_| Err(spawn_failure())));
        assert!(matches!(rc.is_service_running("cron"), Err(Error::Spawn { .. })));
    }

    #[test]
    fn start_stop_strip_service_suffix() {
        let rc = openrc(FakeRunner::ok());
        rc.start_service("nginx.service").unwrap();
        rc.start_service("nginx").unwrap();
        rc.stop_service("nginx.service").unwrap();
        rc.stop_service("nginx").unwrap();
        assert_eq!(
            rc.runner.calls(),
            vec![
                "/sbin/rc-service --quiet nginx start",
                "/sbin/rc-service --quiet nginx start",
                "/sbin/rc-service --quiet nginx stop",
                "/sbin/rc-service --quiet nginx stop",
            ]
        );
    }

    #[test]
    fn start_failure_is_error() {
        let rc = openrc(FakeRunner::new(|_| Err(exit(1))));
        assert!(matches!(rc.start_service("nginx"), Err(Error::Exit { .. })));
    }

    #[test]
    fn enable_disable_use_default_runlevel() {
        let rc = openrc(FakeRunner::ok());
        rc.enable_service("sshd").unwrap();
        rc.disable_service("sshd").unwrap();
        assert_eq!(
            rc.runner.calls(),
            vec![
                "/sbin/rc-update --quiet add sshd default",
                "/sbin/rc-update --quiet del sshd default",
            ]
        );
    }

    #[test]
    fn enabled_checks_runlevel_membership() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("default");
        fs::create_dir_all(&default).unwrap();
        std::os::unix::fs::symlink("/etc/init.d/sshd", default.join("sshd")).unwrap();

        let mut config = Config::default();
        config.openrc.runlevels_dir = dir.path().to_path_buf();
        let rc = OpenRc::with_runner(&config, FakeRunner::ok());

        assert!(rc.is_service_enabled("sshd").unwrap());
        assert!(rc.is_service_enabled("sshd.service").unwrap());
        assert!(!rc.is_service_enabled("nginx").unwrap());
        assert!(rc.runner.calls().is_empty());
    }

    #[test]
    fn reload_is_a_no_op() {
        let rc = openrc(FakeRunner::ok());
        rc.reload().unwrap();
        assert!(rc.runner.calls().is_empty());
    }

    #[test]
    fn parse_list_skips_blank_lines() {
        assert_eq!(parse_list(" sshd \n\n crond\n"), vec!["sshd", "crond"]);
        assert!(parse_list("").is_empty());
    }
}
