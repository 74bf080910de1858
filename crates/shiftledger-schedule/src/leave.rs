//! Leave requests: create, list, review.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;

use shiftledger_core::audit::AuditLog;
use shiftledger_core::clock::Clock;
use shiftledger_core::company::Company;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_core::leave::{LeaveRequest, LeaveStatus, LeaveType};
use shiftledger_core::types::{LeaveRequestId, UserId};
use shiftledger_store::Store;

/// A review decision on a pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveReview {
    Approve,
    Reject,
}

pub struct LeaveService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl LeaveService {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create(
        &self,
        company: &Company,
        employee_id: UserId,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        partial_day_hours: Option<Decimal>,
        reason: Option<String>,
    ) -> Result<LeaveRequest, ShiftledgerError> {
        if start_date > end_date {
            return Err(ShiftledgerError::Validation(
                "start date must be before end date".to_string(),
            ));
        }
        let request = LeaveRequest {
            id: LeaveRequestId::generate(),
            company_id: company.id,
            employee_id,
            leave_type,
            start_date,
            end_date,
            partial_day_hours,
            reason,
            status: LeaveStatus::Pending,
            reviewed_by: None,
            review_comment: None,
            created_at: self.clock.now(),
        };
        self.store.put_leave(&request)?;
        Ok(request)
    }

    pub fn list_for_employee(
        &self,
        company: &Company,
        employee_id: UserId,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<LeaveRequest>, usize), ShiftledgerError> {
        let mut requests: Vec<_> = self
            .store
            .iter_company_leave(&company.id)?
            .into_iter()
            .filter(|r| r.employee_id == employee_id)
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = requests.len();
        Ok((requests.into_iter().skip(skip).take(limit).collect(), total))
    }

    pub fn list_admin(
        &self,
        company: &Company,
        status: Option<LeaveStatus>,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<LeaveRequest>, usize), ShiftledgerError> {
        let mut requests: Vec<_> = self
            .store
            .iter_company_leave(&company.id)?
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = requests.len();
        Ok((requests.into_iter().skip(skip).take(limit).collect(), total))
    }

    /// Approve or reject a pending request. Already-processed requests are
    /// immutable.
    pub fn review(
        &self,
        company: &Company,
        request_id: LeaveRequestId,
        reviewer: UserId,
        decision: LeaveReview,
        comment: Option<String>,
    ) -> Result<LeaveRequest, ShiftledgerError> {
        let mut request = self
            .store
            .get_leave(&request_id)?
            .filter(|r| r.company_id == company.id)
            .ok_or_else(|| ShiftledgerError::LeaveRequestNotFound(request_id.to_string()))?;

        if request.status != LeaveStatus::Pending {
            return Err(ShiftledgerError::Validation(
                "leave request already processed".to_string(),
            ));
        }

        request.status = match decision {
            LeaveReview::Approve => LeaveStatus::Approved,
            LeaveReview::Reject => LeaveStatus::Rejected,
        };
        request.reviewed_by = Some(reviewer);
        request.review_comment = comment;

        self.store.put_leave(&request)?;
        self.store.append_audit(&AuditLog::new(
            company.id,
            Some(reviewer),
            "LEAVE_REVIEW",
            "leave_request",
            request.id,
            json!({ "status": request.status }),
            self.clock.now(),
        ))?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shiftledger_core::clock::FixedClock;
    use shiftledger_core::company::CompanySettings;
    use shiftledger_core::types::CompanyId;

    fn setup(name: &str) -> (Company, LeaveService) {
        let dir = std::env::temp_dir().join(format!("shiftledger_leave_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let store = Arc::new(Store::open(&dir).unwrap());
        let company = Company {
            id: CompanyId::generate(),
            name: "Demo".to_string(),
            slug: "demo".to_string(),
            kiosk_enabled: false,
            settings: CompanySettings::default(),
            created_at: Utc::now(),
        };
        store.insert_company(&company).unwrap();
        let svc = LeaveService::new(store, Arc::new(FixedClock::new(Utc::now())));
        (company, svc)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    #[test]
    fn inverted_range_rejected() {
        let (company, svc) = setup("range");
        let err = svc
            .create(&company, UserId::generate(), LeaveType::Vacation, d(10), d(5), None, None)
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::Validation(_)));
    }

    #[test]
    fn review_is_single_shot() {
        let (company, svc) = setup("single_shot");
        let employee = UserId::generate();
        let request = svc
            .create(&company, employee, LeaveType::Sick, d(5), d(6), None, None)
            .unwrap();

        let reviewed = svc
            .review(&company, request.id, UserId::generate(), LeaveReview::Approve, None)
            .unwrap();
        assert_eq!(reviewed.status, LeaveStatus::Approved);

        let err = svc
            .review(&company, request.id, UserId::generate(), LeaveReview::Reject, None)
            .unwrap_err();
        assert!(matches!(err, ShiftledgerError::Validation(_)));
    }

    #[test]
    fn admin_list_filters_by_status() {
        let (company, svc) = setup("admin_filter");
        let employee = UserId::generate();
        let a = svc
            .create(&company, employee, LeaveType::Personal, d(1), d(1), None, None)
            .unwrap();
        svc.create(&company, employee, LeaveType::Other, d(2), d(2), None, None)
            .unwrap();
        svc.review(&company, a.id, UserId::generate(), LeaveReview::Approve, None)
            .unwrap();

        let (pending, total) = svc
            .list_admin(&company, Some(LeaveStatus::Pending), 0, 10)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(pending[0].leave_type, LeaveType::Other);
    }
}
