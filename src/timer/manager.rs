use std::{collections::BTreeMap, time::Duration};

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::{
    beeper::Beeper,
    command::Command,
    protocol::Response,
    storage::{
        config::{ConfigError, ConfigStore},
        session_log::SessionLog,
    },
    utils::clock::Clock,
};

use super::{
    stats::{aggregate, resolve_date, AggregatedStats, StatsError},
    CountdownTimer, TimerBrief, TimerError, TimerInfo,
};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("No timer exists.")]
    NoTimer,
    #[error("No saved timer with name: \"{0}\"")]
    UnknownSavedTimer(String),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Log(#[from] anyhow::Error),
}

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Done,
    Timer(TimerInfo),
    SavedTimers(Vec<TimerBrief>),
    Stats(AggregatedStats),
}

/// Owner of the active timer, the saved timers and the beeper.
///
/// There is one manager per daemon. It is only obtainable through [TimerManager::init], so every
/// instance has its collaborators initialized before the first command reaches it.
pub struct TimerManager<C, L, B> {
    config: C,
    logger: L,
    beeper: B,
    clock: Box<dyn Clock>,
    current: Option<CountdownTimer>,
    saved: BTreeMap<String, TimerBrief>,
    beep_duration: Duration,
}

impl<C: ConfigStore, L: SessionLog, B: Beeper> TimerManager<C, L, B> {
    pub async fn init(mut config: C, logger: L, beeper: B, clock: Box<dyn Clock>) -> Result<Self> {
        config.init().await?;
        logger.init().await?;

        let mut manager = Self {
            config,
            logger,
            beeper,
            clock,
            current: None,
            saved: BTreeMap::new(),
            beep_duration: Duration::ZERO,
        };
        manager.load_config();
        info!("Timer manager initialized with {} saved timers", manager.saved.len());
        Ok(manager)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Instant at which the active timer elapses, if it is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().and_then(CountdownTimer::deadline)
    }

    /// Normalizes and executes an invocation coming from a client. Validation failures are
    /// returned with their code and leave the manager untouched.
    pub async fn execute_raw(&mut self, raw: &Value) -> Response {
        match Command::parse(raw) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                warn!("Rejected command {raw}: {e}");
                Response::from(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn execute(&mut self, command: Command) -> Response {
        let name = command.name();
        match self.dispatch(command).await {
            Ok(output) => Response::from_output(output),
            Err(e) => {
                warn!("{name} failed: {e}");
                Response::failure(e.to_string())
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Output, ManagerError> {
        if self.beeper.is_beeping() {
            self.beeper.off();

            if command == Command::StopBeeping {
                return Ok(Output::Done);
            }
        }

        self.settle().await;
        let result = self.route(command).await;
        self.handle_completion().await;
        result
    }

    async fn route(&mut self, command: Command) -> Result<Output, ManagerError> {
        match command {
            Command::Start(None) => self.on_current(|timer, clock| timer.start(clock)),
            Command::Pause => self.on_current(|timer, clock| timer.pause(clock)),
            Command::Reset => self.on_current(|timer, clock| Ok(timer.reset(clock))),
            Command::End => self.on_current(|timer, clock| timer.end(clock)),
            Command::Info => self.on_current(|timer, clock| Ok(timer.info(clock))),
            Command::Create(spec) => {
                let timer = CountdownTimer::new(spec.to_brief()?)?;
                info!("Created timer {:?}", timer.brief());
                self.current = Some(timer);
                Ok(Output::Done)
            }
            Command::Start(Some(name)) => self.start_saved(&name),
            Command::Save(spec) => self.save(spec.map(|v| v.to_brief()).transpose()?).await,
            Command::ListSavedTimers => Ok(Output::SavedTimers(
                self.saved.values().cloned().collect(),
            )),
            Command::DeleteSavedTimer(name) => {
                self.config.delete_saved_timer(&name).await?;
                self.reload_config().await?;
                Ok(Output::Done)
            }
            Command::UpdateConfig => {
                self.reload_config().await?;
                Ok(Output::Done)
            }
            Command::Stats(arg) => {
                let date = resolve_date(arg.as_ref(), self.clock.local_time())?;
                let logs = self.logger.get_logs(date).await?;
                Ok(Output::Stats(aggregate(logs)))
            }
            Command::StopBeeping => Ok(Output::Done),
        }
    }

    fn on_current(
        &mut self,
        operation: impl FnOnce(&mut CountdownTimer, &dyn Clock) -> Result<TimerInfo, TimerError>,
    ) -> Result<Output, ManagerError> {
        let timer = self.current.as_mut().ok_or(ManagerError::NoTimer)?;
        Ok(Output::Timer(operation(timer, self.clock.as_ref())?))
    }

    fn start_saved(&mut self, name: &str) -> Result<Output, ManagerError> {
        let brief = self
            .saved
            .get(name)
            .ok_or_else(|| ManagerError::UnknownSavedTimer(name.to_string()))?;
        let mut timer = CountdownTimer::new(brief.clone())?;
        let info = timer.start(self.clock.as_ref())?;
        self.current = Some(timer);
        Ok(Output::Timer(info))
    }

    async fn save(&mut self, brief: Option<TimerBrief>) -> Result<Output, ManagerError> {
        if let Some(brief) = brief {
            self.config.save_timer(brief, false).await?;
            return Ok(Output::Done);
        }

        let brief = self
            .current
            .as_ref()
            .ok_or(ManagerError::NoTimer)?
            .brief()
            .clone();
        self.config.save_timer(brief.clone(), true).await?;
        self.saved.insert(brief.name.clone(), brief);
        Ok(Output::Done)
    }

    async fn reload_config(&mut self) -> Result<(), ConfigError> {
        self.config.update_config().await?;
        self.load_config();
        Ok(())
    }

    fn load_config(&mut self) {
        let config = self.config.get_config();
        self.beep_duration = Duration::from_millis(config.beep_duration);
        self.saved = config.saved_timers.clone();
    }

    /// Ends the active timer if its time ran out and handles its completion.
    pub async fn settle(&mut self) {
        if let Some(timer) = self.current.as_mut() {
            timer.settle(self.clock.as_ref());
        }
        self.handle_completion().await;
    }

    async fn handle_completion(&mut self) {
        let Some(entry) = self.current.as_mut().and_then(CountdownTimer::take_completion) else {
            return;
        };
        info!(
            "Timer {} finished after {}ms",
            entry.name, entry.elapsed_time_ms
        );
        self.beeper.on(self.beep_duration);
        if let Err(e) = self.logger.log(entry).await {
            error!("Failed to log a finished session {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::BTreeMap,
        rc::Rc,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use anyhow::Result;
    use chrono::{Local, NaiveDate, TimeDelta, Utc};
    use mockall::predicate::eq;
    use serde_json::json;

    use crate::{
        beeper::MockBeeper,
        command::{error::ErrorCode, Command},
        protocol::Response,
        storage::{
            config::{ConfigError, ConfigStore, TimerConfig},
            entities::LogEntry,
            session_log::SessionLog,
        },
        timer::{stats::StatsArg, TimeUnit, TimerBrief, TimerInfo, TimerSpec, TimerState},
        utils::clock::DefaultClock,
    };

    use super::TimerManager;

    #[derive(Default)]
    struct MemoryConfig {
        stored: TimerConfig,
        snapshot: TimerConfig,
    }

    impl ConfigStore for MemoryConfig {
        async fn init(&mut self) -> Result<(), ConfigError> {
            self.snapshot = self.stored.clone();
            Ok(())
        }

        async fn update_config(&mut self) -> Result<(), ConfigError> {
            self.snapshot = self.stored.clone();
            Ok(())
        }

        fn get_config(&self) -> &TimerConfig {
            &self.snapshot
        }

        async fn save_timer(&mut self, timer: TimerBrief, is_trusted: bool) -> Result<(), ConfigError> {
            if !is_trusted {
                timer.validate()?;
            }
            self.stored.saved_timers.insert(timer.name.clone(), timer);
            Ok(())
        }

        async fn delete_saved_timer(&mut self, name: &str) -> Result<(), ConfigError> {
            self.stored
                .saved_timers
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| ConfigError::UnknownTimer(name.into()))
        }
    }

    #[derive(Clone, Default)]
    struct MemoryLog {
        entries: Rc<RefCell<Vec<LogEntry>>>,
    }

    impl SessionLog for MemoryLog {
        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn log(&self, entry: LogEntry) -> Result<()> {
            self.entries.borrow_mut().push(entry);
            Ok(())
        }

        async fn get_logs(&self, date: NaiveDate) -> Result<Vec<LogEntry>> {
            Ok(self
                .entries
                .borrow()
                .iter()
                .filter(|v| v.timestamp.with_timezone(&Local).date_naive() == date)
                .cloned()
                .collect())
        }
    }

    fn quiet_beeper() -> MockBeeper {
        let mut beeper = MockBeeper::new();
        beeper.expect_is_beeping().return_const(false);
        beeper
    }

    fn brief(name: &str, duration: u64) -> TimerBrief {
        TimerBrief {
            name: name.into(),
            description: None,
            duration,
        }
    }

    fn spec(name: &str, duration: f64, unit: TimeUnit) -> TimerSpec {
        TimerSpec {
            name: name.into(),
            description: Some(format!("{name} description")),
            duration,
            unit,
        }
    }

    fn config_with(timers: &[TimerBrief]) -> MemoryConfig {
        let stored = TimerConfig {
            beep_duration: 1500,
            saved_timers: timers
                .iter()
                .map(|v| (v.name.clone(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        };
        MemoryConfig {
            stored,
            ..Default::default()
        }
    }

    async fn manager(
        config: MemoryConfig,
        log: MemoryLog,
        beeper: MockBeeper,
    ) -> TimerManager<MemoryConfig, MemoryLog, MockBeeper> {
        TimerManager::init(config, log, beeper, Box::new(DefaultClock))
            .await
            .unwrap()
    }

    fn timer_info(response: Response) -> TimerInfo {
        assert!(response.success, "{response:?}");
        serde_json::from_value(response.data.unwrap()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_commands_need_a_timer() {
        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), quiet_beeper()).await;
        for command in [
            Command::Start(None),
            Command::Pause,
            Command::Reset,
            Command::End,
            Command::Info,
            Command::Save(None),
        ] {
            assert_eq!(
                manager.execute(command).await,
                Response::failure("No timer exists.")
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_start_pause() {
        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), quiet_beeper()).await;
        let created = manager
            .execute(Command::Create(spec("focus", 1., TimeUnit::Seconds)))
            .await;
        assert_eq!(created, Response::ok(None));

        let started = timer_info(manager.execute(Command::Start(None)).await);
        assert_eq!(started.state, TimerState::Running);

        let paused = timer_info(manager.execute(Command::Pause).await);
        assert_eq!(paused.state, TimerState::Paused);
        assert_eq!(paused.elapsed_time + paused.remaining_time, 1000);

        let again = manager.execute(Command::Pause).await;
        assert_eq!(again, Response::failure("The timer is not running."));
    }

    #[tokio::test(start_paused = true)]
    async fn create_replaces_an_unfinished_timer() {
        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), quiet_beeper()).await;
        manager
            .execute(Command::Create(spec("first", 10., TimeUnit::Seconds)))
            .await;
        manager.execute(Command::Start(None)).await;
        manager
            .execute(Command::Create(spec("second", 5., TimeUnit::Seconds)))
            .await;

        let info = timer_info(manager.execute(Command::Info).await);
        assert_eq!(info.brief.name, "second");
        assert_eq!(info.state, TimerState::Created);
        assert_eq!(manager.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ending_beeps_and_logs_once() {
        let log = MemoryLog::default();
        let mut beeper = quiet_beeper();
        beeper
            .expect_on()
            .with(eq(Duration::from_millis(1500)))
            .times(1)
            .return_const(());
        let mut manager = manager(config_with(&[]), log.clone(), beeper).await;

        manager
            .execute(Command::Create(spec("focus", 1., TimeUnit::Minutes)))
            .await;
        manager.execute(Command::Start(None)).await;
        tokio::time::advance(Duration::from_secs(20)).await;

        let ended = timer_info(manager.execute(Command::End).await);
        assert_eq!(ended.state, TimerState::Ended);
        assert_eq!(
            manager.execute(Command::End).await,
            Response::failure("The timer has already ended.")
        );

        let entries = log.entries.borrow().clone();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "focus");
        assert_eq!(entries[0].elapsed_time_ms, 20_000);
    }

    #[tokio::test(start_paused = true)]
    async fn update_config_changes_the_beep_duration() {
        let mut beeper = quiet_beeper();
        beeper
            .expect_on()
            .with(eq(Duration::from_millis(4000)))
            .times(1)
            .return_const(());
        let mut manager = manager(config_with(&[]), MemoryLog::default(), beeper).await;

        manager.config.stored.beep_duration = 4000;
        assert_eq!(manager.execute(Command::UpdateConfig).await, Response::ok(None));

        manager
            .execute(Command::Create(spec("focus", 1., TimeUnit::Seconds)))
            .await;
        manager.execute(Command::Start(None)).await;
        let ended = timer_info(manager.execute(Command::End).await);
        assert_eq!(ended.state, TimerState::Ended);
    }

    #[tokio::test(start_paused = true)]
    async fn natural_elapsation_is_settled_at_the_deadline() {
        let log = MemoryLog::default();
        let mut beeper = quiet_beeper();
        beeper.expect_on().times(1).return_const(());
        let mut manager = manager(config_with(&[]), log.clone(), beeper).await;

        manager
            .execute(Command::Create(spec("tea", 3., TimeUnit::Seconds)))
            .await;
        manager.execute(Command::Start(None)).await;

        let deadline = manager.deadline().unwrap();
        manager.clock().sleep_until(deadline).await;
        manager.settle().await;

        assert_eq!(manager.deadline(), None);
        assert_eq!(log.entries.borrow().len(), 1);
        assert_eq!(log.entries.borrow()[0].elapsed_time_ms, 3000);

        let info = timer_info(manager.execute(Command::Info).await);
        assert_eq!(info.state, TimerState::Ended);
        assert_eq!(info.remaining_time, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsation_is_noticed_by_the_next_command() {
        let log = MemoryLog::default();
        let mut beeper = quiet_beeper();
        beeper.expect_on().times(1).return_const(());
        let mut manager = manager(config_with(&[]), log.clone(), beeper).await;

        manager
            .execute(Command::Create(spec("tea", 2., TimeUnit::Seconds)))
            .await;
        manager.execute(Command::Start(None)).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(
            manager.execute(Command::Pause).await,
            Response::failure("The timer has already ended.")
        );
        assert_eq!(log.entries.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn any_command_stops_beeping() {
        let beeping = Arc::new(AtomicBool::new(true));
        let mut beeper = MockBeeper::new();
        let flag = beeping.clone();
        beeper
            .expect_is_beeping()
            .returning(move || flag.load(Ordering::SeqCst));
        let flag = beeping.clone();
        beeper
            .expect_off()
            .times(1)
            .returning(move || flag.store(false, Ordering::SeqCst));

        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), beeper).await;
        assert_eq!(
            manager.execute(Command::Info).await,
            Response::failure("No timer exists.")
        );
        assert!(!beeping.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_beeping_stops_right_away() {
        let mut beeper = MockBeeper::new();
        beeper.expect_is_beeping().return_const(true);
        beeper.expect_off().times(1).return_const(());

        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), beeper).await;
        assert_eq!(manager.execute(Command::StopBeeping).await, Response::ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn saved_timers() {
        let mut manager = manager(
            config_with(&[brief("tea", 180_000), brief("run", 1_800_000)]),
            MemoryLog::default(),
            quiet_beeper(),
        )
        .await;

        let listed = manager.execute(Command::ListSavedTimers).await;
        assert_eq!(
            listed.data,
            Some(json!([
                { "name": "run", "duration": 1_800_000 },
                { "name": "tea", "duration": 180_000 },
            ]))
        );

        let started = timer_info(manager.execute(Command::Start(Some("tea".into()))).await);
        assert_eq!(started.brief, brief("tea", 180_000));
        assert_eq!(started.state, TimerState::Running);

        assert_eq!(
            manager.execute(Command::Start(Some("swim".into()))).await,
            Response::failure("No saved timer with name: \"swim\"")
        );
        // A failed start keeps the previous timer
        let info = timer_info(manager.execute(Command::Info).await);
        assert_eq!(info.brief.name, "tea");
    }

    #[tokio::test(start_paused = true)]
    async fn saving_the_current_timer_registers_it() {
        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), quiet_beeper()).await;
        manager
            .execute(Command::Create(spec("focus", 25., TimeUnit::Minutes)))
            .await;
        assert_eq!(manager.execute(Command::Save(None)).await, Response::ok(None));

        let listed = manager.execute(Command::ListSavedTimers).await;
        assert_eq!(
            listed.data,
            Some(json!([{ "name": "focus", "description": "focus description", "duration": 1_500_000 }]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn saving_a_spec_leaves_memory_until_reload() {
        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), quiet_beeper()).await;
        manager
            .execute(Command::Save(Some(spec("nap", 20., TimeUnit::Minutes))))
            .await;
        assert_eq!(
            manager.execute(Command::Info).await,
            Response::failure("No timer exists.")
        );
        assert_eq!(
            manager.execute(Command::ListSavedTimers).await.data,
            Some(json!([]))
        );

        manager.execute(Command::UpdateConfig).await;
        let listed = manager.execute(Command::ListSavedTimers).await;
        assert_eq!(listed.data.unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_timers_are_not_listed() {
        let mut manager = manager(
            config_with(&[brief("x", 1000), brief("y", 2000)]),
            MemoryLog::default(),
            quiet_beeper(),
        )
        .await;

        assert_eq!(
            manager
                .execute(Command::DeleteSavedTimer("x".into()))
                .await,
            Response::ok(None)
        );
        let listed = manager.execute(Command::ListSavedTimers).await;
        assert_eq!(listed.data, Some(json!([{ "name": "y", "duration": 2000 }])));

        let again = manager.execute(Command::DeleteSavedTimer("x".into())).await;
        assert_eq!(again, Response::failure("No saved timer with name: \"x\""));
        let listed = manager.execute(Command::ListSavedTimers).await;
        assert!(!listed.data.unwrap().to_string().contains("\"x\""));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_for_days_back() {
        let log = MemoryLog::default();
        let two_days_ago = Utc::now() - TimeDelta::days(2);
        for (name, elapsed_time_ms, timestamp) in [
            ("focus", 1200, two_days_ago),
            ("focus", 800, two_days_ago),
            ("tea", 300, two_days_ago),
            ("focus", 9999, Utc::now()),
        ] {
            log.entries.borrow_mut().push(LogEntry {
                name: name.into(),
                description: None,
                elapsed_time_ms,
                timestamp,
            });
        }
        let mut manager = manager(MemoryConfig::default(), log, quiet_beeper()).await;

        let response = manager.execute(Command::Stats(Some(StatsArg::DaysAgo(2)))).await;
        assert_eq!(
            response.data,
            Some(json!({
                "timerCount": 3,
                "totalDurationMs": 2300,
                "timers": {
                    "focus": { "count": 2, "totalDurationMs": 2000 },
                    "tea": { "count": 1, "totalDurationMs": 300 },
                }
            }))
        );

        let today = manager.execute(Command::Stats(None)).await;
        assert_eq!(today.data.unwrap()["totalDurationMs"], json!(9999));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_reject_invalid_dates() {
        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), quiet_beeper()).await;
        assert_eq!(
            manager
                .execute(Command::Stats(Some(StatsArg::Date("24/22/2022".into()))))
                .await,
            Response::failure("Invalid date string: \"24/22/2022\". Use format: \"mm-dd-yyyy\".")
        );
        assert_eq!(
            manager.execute(Command::Stats(Some(StatsArg::DaysAgo(0)))).await,
            Response::failure("Cannot go \"0\" days back from today.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn raw_commands() {
        let mut manager = manager(MemoryConfig::default(), MemoryLog::default(), quiet_beeper()).await;

        let response = manager
            .execute_raw(&json!({ "command": "start", "options": {} }))
            .await;
        assert_eq!(response, Response::failure("No timer exists."));

        let response = manager
            .execute_raw(&json!({
                "command": "ct",
                "options": { "name": ["coding"], "d": ["20"], "u": ["m"] },
                "arguments": [],
            }))
            .await;
        assert!(response.success);
        let info = timer_info(manager.execute_raw(&json!({ "command": "i", "options": {} })).await);
        assert_eq!(info.brief.duration, 1_200_000);

        let response = manager
            .execute_raw(&json!({ "command": "launch", "options": {} }))
            .await;
        assert!(!response.success);
        assert_eq!(response.code, Some(ErrorCode::UnknownCommand));
        assert_eq!(response.message.as_deref(), Some("Unknown command \"launch\"."));
    }
}
