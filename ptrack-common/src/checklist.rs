//! Participant tracking checklist
//!
//! Every participant carries a fixed set of tracking items. Each item is a
//! checkbox (data received / document uploaded) paired with an optional
//! comment explaining why the item cannot be confirmed. An item counts as
//! satisfied when either is present.

use serde::{Deserialize, Serialize};

/// One boolean/comment pair on a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingItem {
    MonitorDownloaded,
    UltrasoundDownloaded,
    CaseReportFormUploaded,
    VideoLaryngoscopeUploaded,
    RopFinalReportUploaded,
    HeadUltrasoundImagesUploaded,
    HeadUltrasoundReportUploaded,
    CostEffectivenessDataUploaded,
    BloodCultureDone,
    AdmissionNotesDay1Uploaded,
    AdmissionNotes24hrUploaded,
    VitalSignMonitoringDone,
}

impl TrackingItem {
    /// All items in display order
    pub const ALL: [TrackingItem; 12] = [
        TrackingItem::MonitorDownloaded,
        TrackingItem::UltrasoundDownloaded,
        TrackingItem::CaseReportFormUploaded,
        TrackingItem::VideoLaryngoscopeUploaded,
        TrackingItem::RopFinalReportUploaded,
        TrackingItem::HeadUltrasoundImagesUploaded,
        TrackingItem::HeadUltrasoundReportUploaded,
        TrackingItem::CostEffectivenessDataUploaded,
        TrackingItem::BloodCultureDone,
        TrackingItem::AdmissionNotesDay1Uploaded,
        TrackingItem::AdmissionNotes24hrUploaded,
        TrackingItem::VitalSignMonitoringDone,
    ];

    /// Column / form field name of the checkbox
    pub fn key(&self) -> &'static str {
        match self {
            TrackingItem::MonitorDownloaded => "monitor_downloaded",
            TrackingItem::UltrasoundDownloaded => "ultrasound_downloaded",
            TrackingItem::CaseReportFormUploaded => "case_report_form_uploaded",
            TrackingItem::VideoLaryngoscopeUploaded => "video_laryngoscope_uploaded",
            TrackingItem::RopFinalReportUploaded => "rop_final_report_uploaded",
            TrackingItem::HeadUltrasoundImagesUploaded => "head_ultrasound_images_uploaded",
            TrackingItem::HeadUltrasoundReportUploaded => "head_ultrasound_report_uploaded",
            TrackingItem::CostEffectivenessDataUploaded => "cost_effectiveness_data_uploaded",
            TrackingItem::BloodCultureDone => "blood_culture_done",
            TrackingItem::AdmissionNotesDay1Uploaded => "admission_notes_day1_uploaded",
            TrackingItem::AdmissionNotes24hrUploaded => "admission_notes_24hr_uploaded",
            TrackingItem::VitalSignMonitoringDone => "vital_sign_monitoring_done",
        }
    }

    /// Column name of the paired comment
    pub fn comment_key(&self) -> String {
        format!("{}_comment", self.key())
    }

    /// Compact label used on dashboards
    pub fn label(&self) -> &'static str {
        match self {
            TrackingItem::MonitorDownloaded => "Monitor",
            TrackingItem::UltrasoundDownloaded => "Ultrasound",
            TrackingItem::CaseReportFormUploaded => "CRF",
            TrackingItem::VideoLaryngoscopeUploaded => "Video Laryngoscope",
            TrackingItem::RopFinalReportUploaded => "ROP Final Report",
            TrackingItem::HeadUltrasoundImagesUploaded => "Head US Images",
            TrackingItem::HeadUltrasoundReportUploaded => "Head US Report",
            TrackingItem::CostEffectivenessDataUploaded => "Cost-Effect",
            TrackingItem::BloodCultureDone => "Blood Culture",
            TrackingItem::AdmissionNotesDay1Uploaded => "Notes Day 1",
            TrackingItem::AdmissionNotes24hrUploaded => "Notes 24hr",
            TrackingItem::VitalSignMonitoringDone => "Vital Signs",
        }
    }

    /// Spelled-out label used in reminder emails
    pub fn reminder_label(&self) -> &'static str {
        match self {
            TrackingItem::MonitorDownloaded => "Monitor Downloaded",
            TrackingItem::UltrasoundDownloaded => "Ultrasound Downloaded",
            TrackingItem::CaseReportFormUploaded => "Case Report Form",
            TrackingItem::VideoLaryngoscopeUploaded => "Video Laryngoscope",
            TrackingItem::RopFinalReportUploaded => "ROP Final Report",
            TrackingItem::HeadUltrasoundImagesUploaded => "Head US Images",
            TrackingItem::HeadUltrasoundReportUploaded => "Head US Report",
            TrackingItem::CostEffectivenessDataUploaded => "Cost Effectiveness Data",
            TrackingItem::BloodCultureDone => "Blood Culture",
            TrackingItem::AdmissionNotesDay1Uploaded => "Admission Notes Day 1",
            TrackingItem::AdmissionNotes24hrUploaded => "Admission Notes 24hr",
            TrackingItem::VitalSignMonitoringDone => "Vital Sign Monitoring",
        }
    }

    /// Whether the item counts towards completion
    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            TrackingItem::AdmissionNotes24hrUploaded | TrackingItem::VitalSignMonitoringDone
        )
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|item| item.key() == key)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// State of a single tracking item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemState {
    pub done: bool,
    pub comment: Option<String>,
}

impl ItemState {
    pub fn has_comment(&self) -> bool {
        self.comment
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn is_satisfied(&self) -> bool {
        self.done || self.has_comment()
    }
}

/// All tracking items of one participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checklist {
    items: [ItemState; 12],
}

impl Checklist {
    pub fn get(&self, item: TrackingItem) -> &ItemState {
        &self.items[item.index()]
    }

    pub fn is_done(&self, item: TrackingItem) -> bool {
        self.get(item).done
    }

    pub fn set_done(&mut self, item: TrackingItem, done: bool) {
        self.items[item.index()].done = done;
    }

    /// Store a comment; blank text clears it
    pub fn set_comment(&mut self, item: TrackingItem, comment: Option<String>) {
        let comment = comment.filter(|c| !c.trim().is_empty());
        self.items[item.index()].comment = comment;
    }

    /// True when every required item is checked or commented
    pub fn is_completed(&self) -> bool {
        TrackingItem::ALL
            .iter()
            .filter(|item| item.is_required())
            .all(|item| self.get(*item).is_satisfied())
    }

    /// Required items that are neither checked nor commented, in display order
    pub fn missing_items(&self) -> Vec<TrackingItem> {
        TrackingItem::ALL
            .iter()
            .copied()
            .filter(|item| item.is_required() && !self.get(*item).is_satisfied())
            .collect()
    }

    /// Comment paired with a status field name
    ///
    /// Accepts either the checkbox key (`blood_culture_done`) or the comment
    /// key itself (`blood_culture_done_comment`). Unknown keys yield `None`.
    pub fn comment_for(&self, field_name: &str) -> Option<&str> {
        let key = field_name.strip_suffix("_comment").unwrap_or(field_name);
        TrackingItem::from_key(key).and_then(|item| self.get(item).comment.as_deref())
    }

    /// Iterate items with their state, in display order
    pub fn iter(&self) -> impl Iterator<Item = (TrackingItem, &ItemState)> {
        TrackingItem::ALL.iter().map(move |item| (*item, self.get(*item)))
    }
}
