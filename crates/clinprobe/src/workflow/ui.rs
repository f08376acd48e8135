//! Locators and status texts of the clinical application.

use crate::locator::LocatorSpec;

// =============================================================================
// STATUS TEXTS
// =============================================================================

/// Shown while the login request is processed
pub const LOGIN_PENDING: &str = "Aguarde enquanto processamos sua requisição...";

/// Shown while files upload
pub const UPLOADING: &str = "Enviando arquivos...";

/// Shown while uploaded files wait in the queue
pub const AWAITING_PROCESSING: &str = "Aguardando processamento";

/// Prefix of the per-file progress line
pub const PROCESSING: &str = "Processando:";

/// Shown for exams not yet processed
pub const EXAM_AWAITING_PROCESSING: &str = "Exame aguardando processamento";

// =============================================================================
// LOGIN
// =============================================================================

/// Entry button on the landing page
pub fn access_button() -> LocatorSpec {
    LocatorSpec::class_name("access")
}

pub fn email_field() -> LocatorSpec {
    LocatorSpec::id("email")
}

pub fn password_field() -> LocatorSpec {
    LocatorSpec::id("password")
}

/// Submit button of the login form
pub fn submit_login() -> LocatorSpec {
    LocatorSpec::id("next")
}

// =============================================================================
// REGISTRATION
// =============================================================================

pub fn new_patient_button() -> LocatorSpec {
    LocatorSpec::xpath("//button[span[contains(., 'Adicionar novo paciente')]]")
}

pub fn name_field() -> LocatorSpec {
    LocatorSpec::xpath("//input[@formcontrolname='name']")
}

pub fn birthdate_field() -> LocatorSpec {
    LocatorSpec::xpath("//input[@placeholder='DD/MM/AAAA']")
}

pub fn gender_select() -> LocatorSpec {
    LocatorSpec::xpath("//mat-select[@formcontrolname='gender']")
}

/// Option of the gender select with the given label
pub fn gender_option(label: &str) -> LocatorSpec {
    LocatorSpec::xpath(format!("//span[text()='{label}']"))
}

/// Save button of the new-patient dialog
pub fn save_patient() -> LocatorSpec {
    LocatorSpec::xpath("//button//span[text()='Salvar']")
}

pub fn add_files_button() -> LocatorSpec {
    LocatorSpec::xpath("//button[@mattooltip='Adicionar exames, prontuários']")
}

pub fn send_exams_button() -> LocatorSpec {
    LocatorSpec::xpath("//button[.//span[text()='Clique para enviar Exames']]")
}

pub fn send_records_button() -> LocatorSpec {
    LocatorSpec::xpath("//button[.//span[text()='Clique para enviar Prontuários']]")
}

/// Hidden input receiving the uploaded files
pub fn file_input() -> LocatorSpec {
    LocatorSpec::xpath("//input[@type='file' and @accept='image/*,.pdf,.zip']")
}

/// Save button of the upload dialog
pub fn save_uploads() -> LocatorSpec {
    LocatorSpec::xpath("//button[span[text()='Salvar']]")
}

// =============================================================================
// PATIENT SCREENS
// =============================================================================

/// Records tab
pub fn records_tab() -> LocatorSpec {
    LocatorSpec::xpath("//a//img[@src='/assets/icon/VOISTON_ICONS-16.svg']")
}

/// Exams tab
pub fn exams_tab() -> LocatorSpec {
    LocatorSpec::xpath("//a//img[@src='/assets/icon/VOISTON_ICONS-11.svg']")
}

/// Overview tab with the widgets
pub fn overview_tab() -> LocatorSpec {
    LocatorSpec::xpath("//img[@src='/assets/icon/VOISTON_ICONS-01.svg']")
}

pub fn sent_exams_link() -> LocatorSpec {
    LocatorSpec::xpath("//mat-icon[text()='cloud_download']/parent::a")
}

/// Refreshes the sent-exams list
pub fn refresh_sent_exams() -> LocatorSpec {
    LocatorSpec::xpath("//mat-icon[text()='update']")
}

pub fn exam_measurements() -> LocatorSpec {
    LocatorSpec::xpath("//p/span[1]")
}

pub fn exam_errors() -> LocatorSpec {
    LocatorSpec::xpath("//p[contains(text(), 'Erros')]")
}
