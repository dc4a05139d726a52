use std::sync::Arc;

use hostel_types::{AppError, CreateHostelRequest, Hostel, HostelId, HostelRepository, Principal};

use super::load_hostel;

/// Tenant units.
pub struct HostelService<R: HostelRepository> {
    repo: Arc<R>,
}

impl<R: HostelRepository> HostelService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Creates a hostel. Requires a global key.
    pub async fn create_hostel(
        &self,
        principal: &Principal,
        req: CreateHostelRequest,
    ) -> Result<Hostel, AppError> {
        principal.ensure_global()?;
        let hostel = Hostel::new(req.name, req.currency)?;
        self.repo.create_hostel(&hostel).await?;
        tracing::info!(hostel_id = %hostel.id, currency = %hostel.currency, "Hostel created");
        Ok(hostel)
    }

    pub async fn get_hostel(&self, principal: &Principal, id: HostelId) -> Result<Hostel, AppError> {
        principal.ensure_hostel(id)?;
        load_hostel(self.repo.as_ref(), id).await
    }

    /// Lists the hostels the caller can see.
    pub async fn list_hostels(&self, principal: &Principal) -> Result<Vec<Hostel>, AppError> {
        let hostels = self.repo.list_hostels().await?;
        Ok(match principal.hostel_id {
            Some(own) => hostels.into_iter().filter(|h| h.id == own).collect(),
            None => hostels,
        })
    }
}
