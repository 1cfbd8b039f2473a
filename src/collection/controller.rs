use super::error::{ControllerError, RequestFailure};
use super::page::{pages_for, Page, PageInfo, SearchQuery, PAGE_SIZE};
use super::service::CollectionService;
use super::Entity;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::marker::PhantomData;

/// Generation number attached to every issued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

/// A unit of remote work issued by the controller. Executing it is the
/// caller's job (see [`dispatch`]); the result comes back through
/// [`PaginatedCollectionController::apply`].
#[derive(Debug, Clone)]
pub enum Command<D> {
    LoadPage {
        ticket: Ticket,
        page: u32,
        search: Option<SearchQuery>,
    },
    Create {
        ticket: Ticket,
        draft: D,
    },
    Update {
        ticket: Ticket,
        index: usize,
        id: String,
        draft: D,
    },
    Delete {
        ticket: Ticket,
        ids: Vec<String>,
        bulk: bool,
    },
    ExportAll {
        ticket: Ticket,
    },
}

#[derive(Debug, Clone)]
pub enum Outcome<E> {
    Loaded {
        ticket: Ticket,
        result: Result<Page<E>, RequestFailure>,
    },
    Created {
        ticket: Ticket,
        result: Result<E, RequestFailure>,
    },
    Updated {
        ticket: Ticket,
        index: usize,
        id: String,
        result: Result<E, RequestFailure>,
    },
    Deleted {
        ticket: Ticket,
        ids: Vec<String>,
        bulk: bool,
        result: Result<bool, RequestFailure>,
    },
    Exported {
        ticket: Ticket,
        result: Result<Vec<E>, RequestFailure>,
    },
}

/// What applying an outcome asks of the caller.
#[derive(Debug)]
pub enum Applied<E, D> {
    Settled,
    /// The outcome belonged to a superseded load and was dropped.
    Stale,
    /// The page must be refetched; run this command next.
    Reload(Command<D>),
    Exported(Vec<E>),
    Failed(RequestFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Loading,
    Mutating,
    Error,
}

/// Executes one command against a service.
pub fn dispatch<S: CollectionService>(service: &S, command: Command<S::Draft>) -> Outcome<S::Item> {
    match command {
        Command::LoadPage {
            ticket,
            page,
            search,
        } => {
            let result = match search {
                Some(q) => service.search(&q.at_page(page)),
                None => service.list_page(page),
            };
            Outcome::Loaded { ticket, result }
        }
        Command::Create { ticket, draft } => Outcome::Created {
            ticket,
            result: service.create(&draft),
        },
        Command::Update {
            ticket,
            index,
            id,
            draft,
        } => {
            let result = service.update(&id, &draft);
            Outcome::Updated {
                ticket,
                index,
                id,
                result,
            }
        }
        Command::Delete { ticket, ids, bulk } => {
            let result = service.delete(&ids);
            Outcome::Deleted {
                ticket,
                ids,
                bulk,
                result,
            }
        }
        Command::ExportAll { ticket } => Outcome::Exported {
            ticket,
            result: service.list_all(),
        },
    }
}

/// List-plus-pagination state for one screen.
///
/// Operations never touch the network: they check their arguments against the
/// loaded page and hand back a [`Command`]. Outcomes may be applied in any
/// order; only the most recently issued load is allowed to replace the page.
pub struct PaginatedCollectionController<E, D> {
    current_page: u32,
    page_info: Option<PageInfo>,
    items: Vec<E>,
    selection: BTreeSet<String>,
    search: Option<SearchQuery>,
    last_error: Option<RequestFailure>,
    load_failed: bool,
    next_ticket: u64,
    latest_load: Option<Ticket>,
    loading: bool,
    mutations: BTreeSet<Ticket>,
    _draft: PhantomData<fn(D)>,
}

impl<E, D> Default for PaginatedCollectionController<E, D> {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_info: None,
            items: Vec::new(),
            selection: BTreeSet::new(),
            search: None,
            last_error: None,
            load_failed: false,
            next_ticket: 0,
            latest_load: None,
            loading: false,
            mutations: BTreeSet::new(),
            _draft: PhantomData,
        }
    }
}

impl<E: Entity, D> PaginatedCollectionController<E, D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_info(&self) -> Option<PageInfo> {
        self.page_info
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn search_query(&self) -> Option<&SearchQuery> {
        self.search.as_ref()
    }

    pub fn last_error(&self) -> Option<&RequestFailure> {
        self.last_error.as_ref()
    }

    /// True while the latest load or any mutation is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading || !self.mutations.is_empty()
    }

    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Loading
        } else if !self.mutations.is_empty() {
            Phase::Mutating
        } else if self.load_failed {
            Phase::Error
        } else {
            Phase::Idle
        }
    }

    fn issue(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    fn issue_mutation(&mut self) -> Ticket {
        let ticket = self.issue();
        self.mutations.insert(ticket);
        ticket
    }

    fn issue_load(&mut self, page: u32) -> Command<D> {
        self.current_page = page;
        let ticket = self.issue();
        self.latest_load = Some(ticket);
        self.loading = true;
        debug!("load page {page} ({ticket:?})");
        Command::LoadPage {
            ticket,
            page,
            search: self.search.clone(),
        }
    }

    pub fn load_page(&mut self, page: u32) -> Result<Command<D>, ControllerError> {
        if page == 0 {
            return Err(ControllerError::PageOutOfRange(page));
        }
        Ok(self.issue_load(page))
    }

    /// Reissues the load for the page currently shown.
    pub fn reload(&mut self) -> Command<D> {
        self.issue_load(self.current_page.max(1))
    }

    /// Activates a search filter and restarts from page 1.
    pub fn search(&mut self, query: SearchQuery) -> Command<D> {
        self.search = Some(query);
        self.selection.clear();
        self.current_page = 1;
        self.reload()
    }

    pub fn clear_search(&mut self) -> Command<D> {
        self.search = None;
        self.selection.clear();
        self.current_page = 1;
        self.reload()
    }

    pub fn create(&mut self, draft: D) -> Command<D> {
        let ticket = self.issue_mutation();
        Command::Create { ticket, draft }
    }

    pub fn update(&mut self, index: usize, draft: D) -> Result<Command<D>, ControllerError> {
        let Some(row) = self.items.get(index) else {
            return Err(ControllerError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        };
        let id = row.id().to_string();
        let ticket = self.issue_mutation();
        Ok(Command::Update {
            ticket,
            index,
            id,
            draft,
        })
    }

    pub fn delete_one(&mut self, id: &str) -> Result<Command<D>, ControllerError> {
        self.ensure_loaded(id)?;
        let ticket = self.issue_mutation();
        Ok(Command::Delete {
            ticket,
            ids: vec![id.to_string()],
            bulk: false,
        })
    }

    /// Repeated ids are sent once.
    pub fn delete_many(&mut self, ids: Vec<String>) -> Result<Command<D>, ControllerError> {
        let mut seen = BTreeSet::new();
        let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        if ids.is_empty() {
            return Err(ControllerError::EmptySelection);
        }
        for id in &ids {
            self.ensure_loaded(id)?;
        }
        let ticket = self.issue_mutation();
        Ok(Command::Delete {
            ticket,
            ids,
            bulk: true,
        })
    }

    /// Deletes every selected row.
    pub fn delete_selected(&mut self) -> Result<Command<D>, ControllerError> {
        let ids = self.selection.iter().cloned().collect();
        self.delete_many(ids)
    }

    pub fn export_all(&mut self) -> Command<D> {
        Command::ExportAll {
            ticket: self.issue(),
        }
    }

    fn ensure_loaded(&self, id: &str) -> Result<(), ControllerError> {
        if self.items.iter().any(|e| e.id() == id) {
            Ok(())
        } else {
            Err(ControllerError::UnknownId(id.to_string()))
        }
    }

    pub fn select(&mut self, id: &str) -> Result<(), ControllerError> {
        self.ensure_loaded(id)?;
        self.selection.insert(id.to_string());
        Ok(())
    }

    pub fn deselect(&mut self, id: &str) {
        self.selection.remove(id);
    }

    pub fn toggle(&mut self, id: &str) -> Result<(), ControllerError> {
        if self.selection.remove(id) {
            return Ok(());
        }
        self.select(id)
    }

    pub fn select_page(&mut self) {
        self.selection = self.items.iter().map(|e| e.id().to_string()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// The single state-update function. Every outcome, successful or not,
    /// goes through here.
    pub fn apply(&mut self, outcome: Outcome<E>) -> Applied<E, D> {
        match outcome {
            Outcome::Loaded { ticket, result } => self.apply_loaded(ticket, result),
            Outcome::Created { ticket, result } => {
                self.mutations.remove(&ticket);
                match result {
                    Ok(entity) => self.apply_created(entity),
                    Err(f) => self.fail(f),
                }
            }
            Outcome::Updated {
                ticket,
                index,
                id,
                result,
            } => {
                self.mutations.remove(&ticket);
                match result {
                    Ok(entity) => self.apply_updated(index, &id, entity),
                    Err(f) => self.fail(f),
                }
            }
            Outcome::Deleted {
                ticket,
                ids,
                bulk,
                result,
            } => {
                self.mutations.remove(&ticket);
                match result {
                    Ok(true) => self.apply_deleted(&ids, bulk),
                    Ok(false) => self.fail(RequestFailure::rejected(
                        "not_found",
                        "nothing was deleted",
                    )),
                    Err(f) => self.fail(f),
                }
            }
            Outcome::Exported { result, .. } => match result {
                Ok(rows) => Applied::Exported(rows),
                Err(f) => self.fail(f),
            },
        }
    }

    fn fail(&mut self, failure: RequestFailure) -> Applied<E, D> {
        warn!("collection request failed: {failure}");
        self.last_error = Some(failure.clone());
        Applied::Failed(failure)
    }

    fn apply_loaded(
        &mut self,
        ticket: Ticket,
        result: Result<Page<E>, RequestFailure>,
    ) -> Applied<E, D> {
        if self.latest_load != Some(ticket) {
            debug!("dropping stale load {ticket:?}");
            return Applied::Stale;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                self.load_failed = false;
                self.last_error = None;
                if self.page_info.map(|i| i.page) != Some(page.page) {
                    self.selection.clear();
                }
                self.current_page = page.page.max(1);
                self.page_info = Some(page.info());
                self.items = page.items;
                let loaded: BTreeSet<&str> = self.items.iter().map(|e| e.id()).collect();
                self.selection.retain(|id| loaded.contains(id.as_str()));
                Applied::Settled
            }
            Err(f) => {
                self.load_failed = true;
                if let Some(info) = self.page_info {
                    self.current_page = info.page.max(1);
                }
                self.fail(f)
            }
        }
    }

    fn apply_created(&mut self, entity: E) -> Applied<E, D> {
        if self.search.is_some() {
            // Whether the new row matches the filter is the service's call.
            return Applied::Reload(self.reload());
        }
        let Some(info) = self.page_info.as_mut() else {
            return Applied::Settled;
        };
        if info.is_last() && self.items.len() < PAGE_SIZE {
            self.items.push(entity);
        }
        info.total += 1;
        info.pages = pages_for(info.total);
        if info.page > info.pages {
            info.page = info.pages.max(1);
        }
        Applied::Settled
    }

    fn apply_updated(&mut self, index: usize, id: &str, entity: E) -> Applied<E, D> {
        let slot = match self.items.get(index) {
            Some(row) if row.id() == id => Some(index),
            _ => self.items.iter().position(|row| row.id() == id),
        };
        if let Some(i) = slot {
            self.items[i] = entity;
        }
        Applied::Settled
    }

    fn apply_deleted(&mut self, ids: &[String], bulk: bool) -> Applied<E, D> {
        if bulk {
            self.selection.clear();
        } else {
            for id in ids {
                self.selection.remove(id);
            }
        }
        if self.items.len() <= ids.len() && self.current_page > 1 {
            self.current_page -= 1;
        }
        Applied::Reload(self.reload())
    }

    /// Dispatches `command` and every follow-up it triggers until the
    /// controller settles. Exports hand back the full collection.
    pub fn run<S>(&mut self, service: &S, command: Command<D>) -> Result<Option<Vec<E>>, RequestFailure>
    where
        S: CollectionService<Item = E, Draft = D>,
    {
        let mut next = Some(command);
        while let Some(cmd) = next.take() {
            match self.apply(dispatch(service, cmd)) {
                Applied::Settled | Applied::Stale => {}
                Applied::Reload(cmd) => next = Some(cmd),
                Applied::Exported(rows) => return Ok(Some(rows)),
                Applied::Failed(f) => return Err(f),
            }
        }
        Ok(None)
    }
}
