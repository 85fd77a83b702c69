//! Keyword gate for knowledge retrieval.
//!
//! Deliberately coarse: any vocabulary term occurring anywhere in the text
//! (case-insensitive) makes the query in-domain.

const ENGLISH_TERMS: &[&str] = &[
    "medicine",
    "drug",
    "medication",
    "dosage",
    "symptom",
    "diagnosis",
    "treatment",
    "disease",
    "illness",
    "condition",
    "prescription",
    "side effect",
    "interact",
    "pill",
    "tablet",
    "capsule",
    "injection",
    "dose",
    "therapy",
    "medicate",
];

const ITALIAN_TERMS: &[&str] = &[
    "medicina",
    "farmaco",
    "medicinale",
    "dosaggio",
    "sintomo",
    "diagnosi",
    "trattamento",
    "malattia",
    "condizione",
    "prescrizione",
    "ricetta",
    "effetto collaterale",
    "interazione",
    "pillola",
    "compressa",
    "capsula",
    "iniezione",
    "terapia",
    "medicare",
    "cura",
    "guarire",
    "rimedio",
    "integratore",
    "vitamina",
    "minerale",
    "inalatore",
    "gocce",
    "pomata",
    "crema",
    "sciroppo",
    "cerotto",
    "efficacia",
    "funziona per",
    "cosa dovrei prendere",
    "cosa posso usare",
    "cosa aiuta con",
    "posologia",
    "controindicazioni",
    "indicazioni",
    "foglietto illustrativo",
    "bugiardino",
    "antidolorifico",
    "antibiotico",
    "antiinfiammatorio",
    "antipiretico",
    "farmacia",
    "farmacista",
    "dottore",
    "febbre",
    "dolore",
    "infezione",
];

#[derive(Debug, Clone)]
pub struct QueryClassifier {
    terms: Vec<String>,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self {
            terms: ENGLISH_TERMS
                .iter()
                .chain(ITALIAN_TERMS)
                .map(|term| term.to_string())
                .collect(),
        }
    }
}

impl QueryClassifier {
    /// Built-in vocabulary plus operator-supplied terms. Blank terms are
    /// ignored, since an empty needle would match everything.
    pub fn with_extra_terms<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classifier = Self::default();
        for term in extra {
            let term = term.as_ref().trim().to_lowercase();
            if !term.is_empty() && !classifier.terms.contains(&term) {
                classifier.terms.push(term);
            }
        }
        classifier
    }

    pub fn is_in_domain(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.terms.iter().any(|term| haystack.contains(term.as_str()))
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}
