//! Guard command table.
//!
//! Commands are plain uppercase keywords (no `/` prefix) and match only as a
//! whole message, case-insensitively.

use std::fmt;

use chrono::NaiveDateTime;
use rand::Rng;
use rand::seq::SliceRandom;

/// Time format used in shift confirmations.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Date-time format used in guest confirmations.
pub const DATE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// A recognized guard command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `INICIO`: start the shift.
    StartShift,
    /// `TERMINAR`: end the shift.
    EndShift,
    /// `IDENTIFICAR`: simulated photo recognition.
    Identify,
    /// `INVITADO`: register a guest.
    Guest,
    /// `REPORTE`: simulated summary.
    Report,
}

impl Command {
    /// Parse already-trimmed text. Exact keyword match, any letter case.
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_uppercase().as_str() {
            "INICIO" => Some(Command::StartShift),
            "TERMINAR" => Some(Command::EndShift),
            "IDENTIFICAR" => Some(Command::Identify),
            "INVITADO" => Some(Command::Guest),
            "REPORTE" => Some(Command::Report),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Command::StartShift => "INICIO",
            Command::EndShift => "TERMINAR",
            Command::Identify => "IDENTIFICAR",
            Command::Guest => "INVITADO",
            Command::Report => "REPORTE",
        }
    }
}

/// Outcome of the simulated recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognitionLabel {
    Student,
    Teacher,
    Staff,
    Unrecognizable,
}

impl RecognitionLabel {
    pub const ALL: [RecognitionLabel; 4] = [
        RecognitionLabel::Student,
        RecognitionLabel::Teacher,
        RecognitionLabel::Staff,
        RecognitionLabel::Unrecognizable,
    ];

    /// Draw a label uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *Self::ALL
            .choose(rng)
            .unwrap_or(&RecognitionLabel::Unrecognizable)
    }
}

impl fmt::Display for RecognitionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecognitionLabel::Student => "ALUMNO",
            RecognitionLabel::Teacher => "DOCENTE",
            RecognitionLabel::Staff => "PERSONAL",
            RecognitionLabel::Unrecognizable => "NO RECONOCIBLE",
        })
    }
}

/// The single process-wide guard shift.
///
/// Any chat can start or stop it; there is no per-chat shift.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftState {
    pub is_active: bool,
    pub start_time: Option<NaiveDateTime>,
}

impl ShiftState {
    /// Start the shift. Returns `false` if one was already running, in which
    /// case the recorded start time is left untouched.
    pub fn start(&mut self, now: NaiveDateTime) -> bool {
        if self.is_active {
            return false;
        }
        self.is_active = true;
        self.start_time = Some(now);
        true
    }

    /// End the shift. Returns `false` if none was running.
    pub fn end(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.start_time = None;
        true
    }
}

pub(crate) mod replies {
    use chrono::NaiveDateTime;

    use super::{DATE_TIME_FORMAT, RecognitionLabel, TIME_FORMAT};

    pub const SHIFT_ALREADY_ACTIVE: &str =
        "Ya hay un turno iniciado. Escribe TERMINAR para finalizarlo.";
    pub const NO_ACTIVE_SHIFT: &str = "No hay ningún turno iniciado. Escribe INICIO para comenzar.";
    pub const GUEST_NAME_PROMPT: &str =
        "1.- ✍ Por favor, ingresa el NOMBRE completo del invitado.";
    pub const GUEST_BUILDING_PROMPT: &str =
        "2.- 🏢 Ahora ingresa el EDIFICIO o área a la que se dirige el invitado.";
    pub const REPORT: &str =
        "📊 Resumen (simulado):\nAlumnos: 10\nDocentes: 3\nPersonal: 5\nInvitados: 2";
    pub const NOT_UNDERSTOOD: &str =
        "No entiendo ese comando. Usa: INICIO, IDENTIFICAR, INVITADO, REPORTE o TERMINAR.";
    pub const UNKNOWN_GUEST: &str = "Desconocido";

    pub fn shift_started(at: NaiveDateTime) -> String {
        format!(
            "✅ Servicio iniciado a las {}. ¡Buen turno! 👮‍♂️",
            at.format(TIME_FORMAT)
        )
    }

    pub fn shift_ended(at: NaiveDateTime) -> String {
        format!(
            "✅ Servicio finalizado a las {}. ¡Gracias por tu trabajo!",
            at.format(TIME_FORMAT)
        )
    }

    pub fn identified(label: RecognitionLabel) -> String {
        format!("📷 FOTO TOMADA. Enviando para reconocimiento...\nResultado: {label}")
    }

    pub fn guest_registered(name: &str, building: &str, at: NaiveDateTime) -> String {
        format!(
            "3.- ✅ Invitado registrado:\n• Nombre: {name}\n• Edificio: {building}\n• Fecha y hora: {}\nRegistro almacenado.",
            at.format(DATE_TIME_FORMAT)
        )
    }
}
