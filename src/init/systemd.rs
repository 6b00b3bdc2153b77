use super::job::Job;
use super::InitManager;
use crate::config::Config;
use crate::pattern::is_match_all;
use crate::service::InitService;
use crate::{Error, Result};
use futures_util::StreamExt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use zbus::proxy;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{ObjectPath, OwnedObjectPath};

/// Conflicting queued jobs are replaced by the new one.
const JOB_MODE: &str = "replace";

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1"
)]
trait Manager {
    fn subscribe(&self) -> zbus::Result<()>;

    fn load_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;

    fn list_unit_files(&self) -> zbus::Result<Vec<(String, String)>>;

    fn list_unit_files_by_patterns(
        &self,
        states: &[&str],
        patterns: &[&str],
    ) -> zbus::Result<Vec<(String, String)>>;

    fn enable_unit_files(
        &self,
        files: &[&str],
        runtime: bool,
        force: bool,
    ) -> zbus::Result<(bool, Vec<(String, String, String)>)>;

    fn disable_unit_files(
        &self,
        files: &[&str],
        runtime: bool,
    ) -> zbus::Result<Vec<(String, String, String)>>;

    fn start_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    fn reload(&self) -> zbus::Result<()>;

    #[zbus(signal)]
    fn job_removed(
        &self,
        id: u32,
        job: ObjectPath<'_>,
        unit: &str,
        result: &str,
    ) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.systemd1.Unit",
    default_service = "org.freedesktop.systemd1"
)]
trait Unit {
    #[zbus(property)]
    fn active_state(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn unit_file_state(&self) -> zbus::Result<String>;
}

/// Unit properties read by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitProperty {
    ActiveState,
    UnitFileState,
}

impl UnitProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitProperty::ActiveState => "ActiveState",
            UnitProperty::UnitFileState => "UnitFileState",
        }
    }
}

/// An installed unit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFile {
    pub path: String,
    pub state: String,
}

impl UnitFile {
    /// Unit name, e.g. `sshd.service` for `/usr/lib/systemd/system/sshd.service`.
    pub fn name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.path)
    }
}

/// One open connection to the service manager.
#[allow(async_fn_in_trait)]
pub trait UnitBus {
    /// All unit files, or those whose name matches `pattern`.
    async fn list_unit_files(&self, pattern: Option<&str>) -> Result<Vec<UnitFile>>;

    async fn unit_property(&self, unit: &str, property: UnitProperty) -> Result<String>;

    async fn enable_unit_files(&self, units: &[&str]) -> Result<()>;

    async fn disable_unit_files(&self, units: &[&str]) -> Result<()>;

    /// Queue a start job. The returned [`Job`] resolves when the job is removed.
    async fn start_unit(&self, unit: &str, mode: &str) -> Result<Job>;

    async fn stop_unit(&self, unit: &str, mode: &str) -> Result<Job>;

    async fn reload(&self) -> Result<()>;
}

/// Opens connections to the service manager.
#[allow(async_fn_in_trait)]
pub trait Connector: Send + Sync {
    type Bus: UnitBus;

    async fn connect(&self) -> Result<Self::Bus>;
}

/// Connects to systemd on the system bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct DbusConnector;

impl Connector for DbusConnector {
    type Bus = DbusBus;

    async fn connect(&self) -> Result<DbusBus> {
        let conn = zbus::Connection::system().await?;
        let manager = ManagerProxy::new(&conn).await?;
        Ok(DbusBus { conn, manager })
    }
}

pub struct DbusBus {
    conn: zbus::Connection,
    manager: ManagerProxy<'static>,
}

#[derive(Clone, Copy)]
enum JobKind {
    Start,
    Stop,
}

impl DbusBus {
    async fn queue(&self, kind: JobKind, unit: &str, mode: &str) -> Result<Job> {
        // JobRemoved is only emitted to subscribed clients
        self.manager.subscribe().await?;
        // Listen before queueing so a fast job cannot finish unobserved
        let mut removed = self.manager.receive_job_removed().await?;

        let path = match kind {
            JobKind::Start => self.manager.start_unit(unit, mode).await?,
            JobKind::Stop => self.manager.stop_unit(unit, mode).await?,
        };
        tracing::debug!("Queued job {} for {}", path.as_str(), unit);

        let (tx, job) = Job::channel(unit, path.as_str());
        tokio::spawn(async move {
            while let Some(signal) = removed.next().await {
                let Ok(args) = signal.args() else {
                    continue;
                };
                if args.job().as_str() == path.as_str() {
                    let _ = tx.send(args.result().to_string());
                    return;
                }
            }
        });

        Ok(job)
    }
}

impl UnitBus for DbusBus {
    async fn list_unit_files(&self, pattern: Option<&str>) -> Result<Vec<UnitFile>> {
        let files = match pattern {
            None => self.manager.list_unit_files().await?,
            Some(pattern) => {
                let states: &[&str] = &[];
                self.manager
                    .list_unit_files_by_patterns(states, &[pattern])
                    .await?
            }
        };

        Ok(files
            .into_iter()
            .map(|(path, state)| UnitFile { path, state })
            .collect())
    }

    async fn unit_property(&self, unit: &str, property: UnitProperty) -> Result<String> {
        let path = self.manager.load_unit(unit).await?;
        let proxy = UnitProxy::builder(&self.conn)
            .path(path.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;

        let value = match property {
            UnitProperty::ActiveState => proxy.active_state().await?,
            UnitProperty::UnitFileState => proxy.unit_file_state().await?,
        };
        Ok(value)
    }

    async fn enable_unit_files(&self, units: &[&str]) -> Result<()> {
        self.manager.enable_unit_files(units, false, true).await?;
        Ok(())
    }

    async fn disable_unit_files(&self, units: &[&str]) -> Result<()> {
        self.manager.disable_unit_files(units, false).await?;
        Ok(())
    }

    async fn start_unit(&self, unit: &str, mode: &str) -> Result<Job> {
        self.queue(JobKind::Start, unit, mode).await
    }

    async fn stop_unit(&self, unit: &str, mode: &str) -> Result<Job> {
        self.queue(JobKind::Stop, unit, mode).await
    }

    async fn reload(&self) -> Result<()> {
        self.manager.reload().await?;
        Ok(())
    }
}

/// systemd, driven over D-Bus.
///
/// Every operation opens its own connection and must finish, job wait
/// included, within the configured timeout. That deadline is reported as
/// [`Error::Deadline`], separately from a job that systemd itself reports
/// as timed out. Listing is the exception: the deadline covers the listing
/// call, and each unit's state read gets a deadline of its own.
///
/// Calls run on a private current-thread runtime. When the caller is already
/// inside a tokio runtime, that runtime is moved to a scoped thread and the
/// calling thread blocks until it finishes.
pub struct Systemd<C = DbusConnector> {
    connector: C,
    timeout: Duration,
}

impl Systemd {
    pub fn new(config: &Config) -> Self {
        Self::with_connector(DbusConnector, config.timeout())
    }
}

impl<C: Connector> Systemd<C> {
    pub fn with_connector(connector: C, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Connect, run `op` on the connection and close it, all under the deadline.
    fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        T: Send,
        F: FnOnce(C::Bus) -> Fut + Send,
        Fut: Future<Output = Result<T>>,
    {
        self.block_on(|| {
            self.deadline(async {
                let bus = self.connector.connect().await?;
                op(bus).await
            })
        })
    }

    async fn deadline<T>(&self, session: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, session)
            .await
            .map_err(|_| Error::Deadline(self.timeout))?
    }

    /// Drive the future built by `make` to completion on a fresh runtime.
    fn block_on<T, M, Fut>(&self, make: M) -> Result<T>
    where
        T: Send,
        M: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>>,
    {
        let session = move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(Error::Runtime)?;
            runtime.block_on(make())
        };

        if tokio::runtime::Handle::try_current().is_err() {
            return session();
        }

        // A runtime cannot be started from a thread that is driving one
        std::thread::scope(|scope| match scope.spawn(session).join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        })
    }
}

async fn is_active<B: UnitBus>(bus: &B, unit: &str) -> Result<bool> {
    let state = bus.unit_property(unit, UnitProperty::ActiveState).await?;
    Ok(state == "active")
}

async fn start<B: UnitBus>(bus: &B, unit: &str) -> Result<()> {
    bus.start_unit(unit, JOB_MODE).await?.wait().await
}

async fn stop<B: UnitBus>(bus: &B, unit: &str) -> Result<()> {
    bus.stop_unit(unit, JOB_MODE).await?.wait().await
}

impl<C: Connector> InitManager for Systemd<C> {
    fn name(&self) -> &str {
        "systemd"
    }

    fn list_services(&self, pattern: &str) -> Result<Vec<InitService>> {
        let pattern = (!is_match_all(pattern)).then_some(pattern);

        self.block_on(|| async move {
            let (bus, files) = self
                .deadline(async {
                    let bus = self.connector.connect().await?;
                    let files = bus.list_unit_files(pattern).await?;
                    Ok((bus, files))
                })
                .await?;

            let mut services = Vec::with_capacity(files.len());
            for file in &files {
                let name = file.name();
                tracing::debug!("Reading state of {} ({})", name, file.state);
                let read = tokio::time::timeout(self.timeout, is_active(&bus, name));
                let running = match read.await {
                    Ok(Ok(running)) => running,
                    Ok(Err(e)) => {
                        tracing::warn!("Failed to get state of {}: {}", name, e);
                        false
                    }
                    Err(_) => {
                        tracing::warn!(
                            "Timed out getting state of {} after {:?}",
                            name,
                            self.timeout
                        );
                        false
                    }
                };
                services.push(InitService::new(name, running));
            }

            Ok(services)
        })
    }

    fn is_service_enabled(&self, name: &str) -> Result<bool> {
        self.run(|bus| async move {
            let state = bus.unit_property(name, UnitProperty::UnitFileState).await?;
            Ok(state == "enabled")
        })
    }

    fn is_service_running(&self, name: &str) -> Result<bool> {
        self.run(|bus| async move { is_active(&bus, name).await })
    }

    /// Enables the unit and starts it if it is not already active.
    fn enable_service(&self, name: &str) -> Result<()> {
        self.run(|bus| async move {
            bus.enable_unit_files(&[name]).await?;

            if !is_active(&bus, name).await? {
                start(&bus, name).await?;
            }

            Ok(())
        })
    }

    /// Stops an active unit instead of disabling it; only an inactive unit is
    /// disabled.
    fn disable_service(&self, name: &str) -> Result<()> {
        self.run(|bus| async move {
            if is_active(&bus, name).await? {
                return stop(&bus, name).await;
            }

            bus.disable_unit_files(&[name]).await
        })
    }

    fn start_service(&self, name: &str) -> Result<()> {
        self.run(|bus| async move { start(&bus, name).await })
    }

    fn stop_service(&self, name: &str) -> Result<()> {
        self.run(|bus| async move { stop(&bus, name).await })
    }

    fn reload(&self) -> Result<()> {
        self.run(|bus| async move { bus.reload().await })
    }
}
