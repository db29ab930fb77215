use std::fmt;

use super::ConfigError;

/// Field identity independent of the portal language a page was served in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalKey {
    Properties,
    LearningOutcomes,
    AdditionalInformation,
    SubjectOfCourse,
    TeachingMethods,
    ModeOfExamination,
    ExaminationModalities,
    CourseRegistration,
    Literature,
    PreviousKnowledge,
    PrecedingCourses,
    Lecturers,
    Language,
    Institute,
    GroupDates,
    Exams,
    GroupRegistration,
    CourseDates,
    Curricula,
}

impl CanonicalKey {
    pub const ALL: [CanonicalKey; 19] = [
        CanonicalKey::Properties,
        CanonicalKey::LearningOutcomes,
        CanonicalKey::AdditionalInformation,
        CanonicalKey::SubjectOfCourse,
        CanonicalKey::TeachingMethods,
        CanonicalKey::ModeOfExamination,
        CanonicalKey::ExaminationModalities,
        CanonicalKey::CourseRegistration,
        CanonicalKey::Literature,
        CanonicalKey::PreviousKnowledge,
        CanonicalKey::PrecedingCourses,
        CanonicalKey::Lecturers,
        CanonicalKey::Language,
        CanonicalKey::Institute,
        CanonicalKey::GroupDates,
        CanonicalKey::Exams,
        CanonicalKey::GroupRegistration,
        CanonicalKey::CourseDates,
        CanonicalKey::Curricula,
    ];

    /// Stable snake_case name used for storage and export columns.
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalKey::Properties => "properties",
            CanonicalKey::LearningOutcomes => "learning_outcomes",
            CanonicalKey::AdditionalInformation => "additional_information",
            CanonicalKey::SubjectOfCourse => "subject",
            CanonicalKey::TeachingMethods => "methods",
            CanonicalKey::ModeOfExamination => "exam_mode",
            CanonicalKey::ExaminationModalities => "exam_modalities",
            CanonicalKey::CourseRegistration => "registration",
            CanonicalKey::Literature => "literature",
            CanonicalKey::PreviousKnowledge => "previous_knowledge",
            CanonicalKey::PrecedingCourses => "preceding_courses",
            CanonicalKey::Lecturers => "lecturers",
            CanonicalKey::Language => "language",
            CanonicalKey::Institute => "institute",
            CanonicalKey::GroupDates => "group_dates",
            CanonicalKey::Exams => "exams",
            CanonicalKey::GroupRegistration => "group_registration",
            CanonicalKey::CourseDates => "course_dates",
            CanonicalKey::Curricula => "curricula",
        }
    }

    /// Keys that may legitimately occur more than once per document.
    /// Their occurrences get distinct slots instead of overwriting.
    pub fn multiplicity_bearing(self) -> bool {
        matches!(self, CanonicalKey::AdditionalInformation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    De,
}

impl Lang {
    pub fn as_str(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::De => "de",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Lang::En),
            "de" => Ok(Lang::De),
            other => Err(format!("unknown language {:?}, expected en or de", other)),
        }
    }
}

/// English and German alias per key, as the portal renders them.
const BUILTIN: [(CanonicalKey, &str, &str); 19] = [
    (CanonicalKey::Properties, "Properties", "Merkmale"),
    (CanonicalKey::LearningOutcomes, "Learning outcomes", "Lernergebnisse"),
    (CanonicalKey::AdditionalInformation, "Additional information", "Weitere Informationen"),
    (CanonicalKey::SubjectOfCourse, "Subject of course", "Inhalt der Lehrveranstaltung"),
    (CanonicalKey::TeachingMethods, "Teaching methods", "Methoden"),
    (CanonicalKey::ModeOfExamination, "Mode of examination", "Prüfungsmodus"),
    (CanonicalKey::ExaminationModalities, "Examination modalities", "Leistungsnachweis"),
    (CanonicalKey::CourseRegistration, "Course registration", "LVA-Anmeldung"),
    (CanonicalKey::Literature, "Literature", "Literatur"),
    (CanonicalKey::PreviousKnowledge, "Previous knowledge", "Vorkenntnisse"),
    (CanonicalKey::PrecedingCourses, "Preceding courses", "Vorausgehende Lehrveranstaltungen"),
    (CanonicalKey::Lecturers, "Lecturers", "Vortragende Personen"),
    (CanonicalKey::Language, "Language", "Sprache"),
    (CanonicalKey::Institute, "Institute", "Institut"),
    (CanonicalKey::GroupDates, "Group dates", "Gruppentermine"),
    (CanonicalKey::Exams, "Exams", "Prüfungen"),
    (CanonicalKey::GroupRegistration, "Group Registration", "Gruppen-Anmeldung"),
    (CanonicalKey::CourseDates, "Course dates", "LVA Termine"),
    (CanonicalKey::Curricula, "Curricula", "Curricula"),
];

/// Bilingual header-to-key table. The builtin table covers every key by
/// construction; custom tables are validated when built.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: Vec<(CanonicalKey, String, String)>,
}

impl AliasTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(key, en, de)| (*key, en.to_string(), de.to_string()))
                .collect(),
        }
    }

    /// Build a table from `(key, english, german)` rows. Every canonical
    /// key must be covered in both languages.
    pub fn custom(
        rows: impl IntoIterator<Item = (CanonicalKey, String, String)>,
    ) -> Result<Self, ConfigError> {
        let entries: Vec<_> = rows.into_iter().collect();
        for key in CanonicalKey::ALL {
            for (lang, alias) in [
                (Lang::En, entries.iter().find(|e| e.0 == key).map(|e| &e.1)),
                (Lang::De, entries.iter().find(|e| e.0 == key).map(|e| &e.2)),
            ] {
                if alias.map_or(true, |a| a.is_empty()) {
                    return Err(ConfigError::MissingAlias { key, lang });
                }
            }
        }
        Ok(Self { entries })
    }

    fn lookup(&self, lang: Lang, header: &str) -> Option<CanonicalKey> {
        self.entries
            .iter()
            .find(|(_, en, de)| match lang {
                Lang::En => en == header,
                Lang::De => de == header,
            })
            .map(|(key, _, _)| *key)
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Known(CanonicalKey),
    Unknown(String),
}

/// Per-document normalizer. Holds the language hint, which persists once
/// inferred; never shared across documents.
pub struct Normalizer<'t> {
    table: &'t AliasTable,
    hint: Option<Lang>,
}

impl<'t> Normalizer<'t> {
    pub fn new(table: &'t AliasTable, hint: Option<Lang>) -> Self {
        Self { table, hint }
    }

    pub fn hint(&self) -> Option<Lang> {
        self.hint
    }

    pub fn normalize(&mut self, header: &str) -> Normalized {
        if let Some(lang) = self.hint {
            return match self.table.lookup(lang, header) {
                Some(key) => Normalized::Known(key),
                None => Normalized::Unknown(header.to_string()),
            };
        }

        match (
            self.table.lookup(Lang::En, header),
            self.table.lookup(Lang::De, header),
        ) {
            (Some(key), None) => {
                self.hint = Some(Lang::En);
                Normalized::Known(key)
            }
            (None, Some(key)) => {
                self.hint = Some(Lang::De);
                Normalized::Known(key)
            }
            // Spelled the same in both languages ("Curricula"): no signal.
            (Some(key), Some(_)) => Normalized::Known(key),
            (None, None) => Normalized::Unknown(header.to_string()),
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> AliasTable {
        AliasTable::builtin()
    }

    #[test]
    fn english_and_german_aliases() {
        let table = fresh();
        let mut n = Normalizer::new(&table, Some(Lang::En));
        assert_eq!(
            n.normalize("Learning outcomes"),
            Normalized::Known(CanonicalKey::LearningOutcomes)
        );
        let mut n = Normalizer::new(&table, Some(Lang::De));
        assert_eq!(
            n.normalize("Lernergebnisse"),
            Normalized::Known(CanonicalKey::LearningOutcomes)
        );
    }

    #[test]
    fn hint_inferred_from_unique_match() {
        let table = fresh();
        let mut n = Normalizer::new(&table, None);
        assert_eq!(n.hint(), None);
        assert_eq!(
            n.normalize("Merkmale"),
            Normalized::Known(CanonicalKey::Properties)
        );
        assert_eq!(n.hint(), Some(Lang::De));
        // The hint persists: an English header is now foreign.
        assert_eq!(
            n.normalize("Properties"),
            Normalized::Unknown("Properties".to_string())
        );
    }

    #[test]
    fn shared_spelling_gives_no_hint() {
        let table = fresh();
        let mut n = Normalizer::new(&table, None);
        assert_eq!(
            n.normalize("Curricula"),
            Normalized::Known(CanonicalKey::Curricula)
        );
        assert_eq!(n.hint(), None);
    }

    #[test]
    fn normalize_is_idempotent() {
        let table = fresh();
        let mut n = Normalizer::new(&table, Some(Lang::En));
        let first = n.normalize("Institute");
        let second = n.normalize("Institute");
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_header_passes_through() {
        let table = fresh();
        let mut n = Normalizer::new(&table, Some(Lang::En));
        assert_eq!(
            n.normalize("Cafeteria menu"),
            Normalized::Unknown("Cafeteria menu".to_string())
        );
    }

    #[test]
    fn custom_table_must_cover_every_key() {
        let err = AliasTable::custom([(
            CanonicalKey::Properties,
            "Properties".to_string(),
            "Merkmale".to_string(),
        )])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingAlias { .. }));
    }

    #[test]
    fn only_additional_information_bears_multiplicity() {
        for key in CanonicalKey::ALL {
            assert_eq!(
                key.multiplicity_bearing(),
                key == CanonicalKey::AdditionalInformation
            );
        }
    }
}
