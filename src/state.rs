use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::data::cache::DatasetCache;
use crate::data::filter::FilterOption;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full window state, independent of rendering.
pub struct AppState {
    pub config: Arc<DashboardConfig>,

    /// Cleaned datasets by source path.
    pub cache: DatasetCache,

    /// The file the current session was opened from.
    pub source: Option<PathBuf>,

    /// None until a file loads successfully.
    pub session: Option<Session>,

    /// Index into `config.tabs`.
    pub active_tab: usize,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            cache: DatasetCache::new(config.cleaning_rules()),
            config: Arc::new(config),
            source: None,
            session: None,
            active_tab: 0,
            status_message: None,
        }
    }

    /// Open `path` through the cache and start a fresh session on it.
    ///
    /// Failures are reported in `status_message`; there is no retry.
    pub fn open(&mut self, path: PathBuf) {
        let result = self
            .cache
            .get_or_load(&path)
            .map_err(|e| e.to_string())
            .and_then(|ds| Session::new(ds, Arc::clone(&self.config)).map_err(|e| e.to_string()));
        self.start(path, result);
    }

    /// Drop the cached copy of the current file and load it again.
    pub fn reload(&mut self) {
        let Some(path) = self.source.clone() else {
            return;
        };
        let result = self
            .cache
            .reload(&path)
            .map_err(|e| e.to_string())
            .and_then(|ds| Session::new(ds, Arc::clone(&self.config)).map_err(|e| e.to_string()));
        self.start(path, result);
    }

    fn start(&mut self, path: PathBuf, result: Result<Session, String>) {
        match result {
            Ok(session) => {
                log::info!(
                    "Session started on {} ({} records)",
                    path.display(),
                    session.dataset().len()
                );
                self.session = Some(session);
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to open {}: {e}", path.display());
                self.session = None;
                self.status_message = Some(format!("Error: {e}"));
            }
        }
        self.source = Some(path);
    }

    /// Apply a filter-control choice to the current session.
    pub fn set_filter(&mut self, field: &str, option: &FilterOption) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.set_filter(field, option.to_constraint()) {
            log::error!("Filter on '{field}' rejected: {e}");
            self.status_message = Some(format!("Error: {e}"));
        }
    }

    pub fn reset_filters(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.reset_filters() {
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::config::{COL_GENDER, COL_PAYER, COL_PRESCRIBER, COL_REGION, COL_STATUS, COL_STATUS_TYPE};
    use crate::session::ViewState;

    fn followups_csv() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "Unnamed: 0,{COL_STATUS},{COL_STATUS_TYPE},{COL_PRESCRIBER},{COL_REGION},{COL_GENDER},{COL_PAYER}"
        )
        .unwrap();
        writeln!(file, "0,Activo,Con Barrera,Dr. Ruiz,Norte,Femenino,Sura").unwrap();
        writeln!(file, "1,Activo,Sin Barrera,Dr. Ruiz,Sur,Masculino,[NULL]").unwrap();
        writeln!(file, "2,Inactivo,,Dra. Gomez,Norte,Femenino,Sanitas").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn opening_a_valid_file_starts_a_session() {
        let file = followups_csv();
        let mut state = AppState::new(DashboardConfig::default());
        state.open(file.path().to_path_buf());

        assert!(state.status_message.is_none());
        let session = state.session.as_ref().unwrap();
        assert_eq!(session.view_state(), ViewState::Ready { rows: 3 });
        assert_eq!(session.kpis().shares.len(), 2);
    }

    #[test]
    fn filter_choices_reach_the_session() {
        let file = followups_csv();
        let mut state = AppState::new(DashboardConfig::default());
        state.open(file.path().to_path_buf());

        state.set_filter(COL_PAYER, &FilterOption::Value("Not recorded".into()));
        let session = state.session.as_ref().unwrap();
        assert_eq!(session.view_state(), ViewState::Ready { rows: 1 });

        state.set_filter(COL_REGION, &FilterOption::Value("Norte".into()));
        assert_eq!(state.session.as_ref().unwrap().view_state(), ViewState::Empty);

        state.reset_filters();
        assert_eq!(
            state.session.as_ref().unwrap().view_state(),
            ViewState::Ready { rows: 3 }
        );
    }

    #[test]
    fn load_errors_are_reported_not_retried() {
        let mut state = AppState::new(DashboardConfig::default());
        state.open(PathBuf::from("/missing/Datos prueba.xlsx"));
        assert!(state.session.is_none());
        assert!(state.status_message.as_deref().unwrap().contains("not found"));
        assert!(state.cache.is_empty());
    }

    #[test]
    fn missing_categorical_column_is_a_load_error() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{COL_STATUS},{COL_GENDER}\nActivo,Femenino").unwrap();
        let mut state = AppState::new(DashboardConfig::default());
        state.open(file.path().to_path_buf());
        assert!(state.session.is_none());
        assert!(state.status_message.is_some());
    }

    #[test]
    fn reload_refreshes_the_session() {
        let file = followups_csv();
        let mut state = AppState::new(DashboardConfig::default());
        state.open(file.path().to_path_buf());

        let mut handle = std::fs::OpenOptions::new().append(true).open(file.path()).unwrap();
        writeln!(handle, "3,Activo,Con Barrera,Dr. Ruiz,Sur,Otro,Sura").unwrap();

        state.reload();
        assert_eq!(
            state.session.as_ref().unwrap().view_state(),
            ViewState::Ready { rows: 4 }
        );
    }
}
