//! Resource type names defined by FHIR 1.0.2
//!
//! The embedded catalog leaves out the conformance resources (`ValueSet`,
//! `StructureDefinition` and friends). The factory uses this table to tell a
//! known-but-uncatalogued resource apart from a typo.

use phf::phf_set;

static DSTU2_RESOURCES: phf::Set<&'static str> = phf_set! {
    "Account",
    "AllergyIntolerance",
    "Appointment",
    "AppointmentResponse",
    "AuditEvent",
    "Basic",
    "Binary",
    "BodySite",
    "Bundle",
    "CarePlan",
    "Claim",
    "ClaimResponse",
    "ClinicalImpression",
    "Communication",
    "CommunicationRequest",
    "Composition",
    "ConceptMap",
    "Condition",
    "Conformance",
    "Contract",
    "Coverage",
    "DataElement",
    "DetectedIssue",
    "Device",
    "DeviceComponent",
    "DeviceMetric",
    "DeviceUseRequest",
    "DeviceUseStatement",
    "DiagnosticOrder",
    "DiagnosticReport",
    "DocumentManifest",
    "DocumentReference",
    "DomainResource",
    "EligibilityRequest",
    "EligibilityResponse",
    "Encounter",
    "EnrollmentRequest",
    "EnrollmentResponse",
    "EpisodeOfCare",
    "ExplanationOfBenefit",
    "FamilyMemberHistory",
    "Flag",
    "Goal",
    "Group",
    "HealthcareService",
    "ImagingObjectSelection",
    "ImagingStudy",
    "Immunization",
    "ImmunizationRecommendation",
    "ImplementationGuide",
    "List",
    "Location",
    "Media",
    "Medication",
    "MedicationAdministration",
    "MedicationDispense",
    "MedicationOrder",
    "MedicationStatement",
    "MessageHeader",
    "NamingSystem",
    "NutritionOrder",
    "Observation",
    "OperationDefinition",
    "OperationOutcome",
    "Order",
    "OrderResponse",
    "Organization",
    "Parameters",
    "Patient",
    "PaymentNotice",
    "PaymentReconciliation",
    "Person",
    "Practitioner",
    "Procedure",
    "ProcedureRequest",
    "ProcessRequest",
    "ProcessResponse",
    "Provenance",
    "Questionnaire",
    "QuestionnaireResponse",
    "ReferralRequest",
    "RelatedPerson",
    "Resource",
    "RiskAssessment",
    "Schedule",
    "SearchParameter",
    "Slot",
    "Specimen",
    "StructureDefinition",
    "Subscription",
    "Substance",
    "SupplyDelivery",
    "SupplyRequest",
    "TestScript",
    "ValueSet",
    "VisionPrescription",
};

/// Whether `name` is a resource type of FHIR 1.0.2
pub fn is_dstu2_resource(name: &str) -> bool {
    DSTU2_RESOURCES.contains(name)
}

/// All FHIR 1.0.2 resource type names, sorted
pub fn dstu2_resource_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = DSTU2_RESOURCES.iter().copied().collect();
    names.sort_unstable();
    names
}
