//! Authorized requests against the employee portal.
//!
//! Every call reads the token from the shared session at send time, so a
//! logout or re-login elsewhere is picked up immediately. A 401 from the
//! server ends the session through [`SessionHandle::invalidate`].

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::schema::ChangePasswordQuery;
use super::{ApiClient, ApiError};
use crate::auth::validation::{self, ValidationError};
use crate::auth::{AuthError, SessionHandle};
use crate::models::{
    Dashboard, Department, Holiday, LeaveApplication, NewLeaveApplication, PersonalEvent,
    PersonalInfo, WorkingDay,
};

const PERSONAL_INFO_PATH: &str = "me/personal_info";
const DEPARTMENT_PATH: &str = "me/department";
const APPLICATIONS_PATH: &str = "me/application";
const PERSONAL_EVENTS_PATH: &str = "me/personal_event";
const WORKING_HISTORY_PATH: &str = "me/working/history";
const HOLIDAYS_PATH: &str = "me/holidays";
const CHANGE_PASSWORD_PATH: &str = "me/user/change-password";

#[derive(Clone)]
pub struct PortalClient {
    api: ApiClient,
    session: SessionHandle,
}

impl PortalClient {
    pub fn new(api: ApiClient, session: SessionHandle) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Attach the current bearer token and send.
    ///
    /// No request goes out without a live session. A 401 answer ends the
    /// session that sent it.
    async fn send(&self, request: RequestBuilder) -> Result<Response, AuthError> {
        let token = self.session.current_token()?;
        let response = request
            .bearer_auth(&token)
            .send()
            .await
            .map_err(ApiError::from)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            debug!(body = %body, "Request rejected with 401");
            self.session.invalidate(&token);
            return Err(AuthError::Unauthorized);
        }

        Ok(ApiClient::check_response(response).await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T, AuthError> {
        let url = self.api.endpoint(path);
        debug!(url = %url, "Fetching {}", what);
        let response = self.send(self.api.http().get(&url)).await?;
        Ok(ApiClient::read_json(response, what).await?)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn personal_info(&self) -> Result<PersonalInfo, AuthError> {
        self.get_json(PERSONAL_INFO_PATH, "personal info").await
    }

    pub async fn department(&self) -> Result<Department, AuthError> {
        self.get_json(DEPARTMENT_PATH, "department").await
    }

    pub async fn applications(&self) -> Result<Vec<LeaveApplication>, AuthError> {
        self.get_json(APPLICATIONS_PATH, "leave applications").await
    }

    pub async fn application(&self, application_id: &str) -> Result<LeaveApplication, AuthError> {
        let path = format!("{}/{}", APPLICATIONS_PATH, application_id);
        self.get_json(&path, "leave application").await
    }

    pub async fn personal_events(&self) -> Result<Vec<PersonalEvent>, AuthError> {
        self.get_json(PERSONAL_EVENTS_PATH, "personal events").await
    }

    pub async fn working_history(&self) -> Result<Vec<WorkingDay>, AuthError> {
        self.get_json(WORKING_HISTORY_PATH, "working history").await
    }

    pub async fn holidays(&self) -> Result<Vec<Holiday>, AuthError> {
        self.get_json(HOLIDAYS_PATH, "holidays").await
    }

    /// Fetch the home-screen data concurrently. The first failure is returned.
    pub async fn dashboard(&self) -> Result<Dashboard, AuthError> {
        let (personal_info, department, events, applications) = futures::try_join!(
            self.personal_info(),
            self.department(),
            self.personal_events(),
            self.applications(),
        )?;
        Ok(Dashboard {
            personal_info,
            department,
            events,
            applications,
        })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// File a leave application. The backend reads it from query parameters.
    pub async fn submit_application(
        &self,
        application: &NewLeaveApplication,
    ) -> Result<LeaveApplication, AuthError> {
        if application.end_date < application.start_date {
            return Err(ValidationError::InvalidDateRange.into());
        }

        let url = self.api.endpoint(APPLICATIONS_PATH);
        let request = self.api.http().post(&url).query(application);
        let response = self.send(request).await?;
        let created: LeaveApplication = ApiClient::read_json(response, "created application").await?;
        info!(application_id = %created.application_id, "Leave application submitted");
        Ok(created)
    }

    pub async fn withdraw_application(&self, application_id: &str) -> Result<(), AuthError> {
        if application_id.trim().is_empty() {
            return Err(ValidationError::MissingField("Application id").into());
        }
        let url = self.api.endpoint(&format!("{}/{}", APPLICATIONS_PATH, application_id.trim()));
        self.send(self.api.http().delete(&url)).await?;
        info!(application_id, "Leave application withdrawn");
        Ok(())
    }

    /// Change the password of the signed-in user.
    ///
    /// The backend answers a wrong current password with 401, which ends the
    /// session like any other 401.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        validation::validate_password_change(current_password, new_password, confirm_password)?;

        let url = self.api.endpoint(CHANGE_PASSWORD_PATH);
        let request = self.api.http().put(&url).query(&ChangePasswordQuery {
            current_password,
            new_password,
        });
        match self.send(request).await {
            Ok(_) => {
                info!("Password changed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Password change failed");
                Err(e)
            }
        }
    }
}
